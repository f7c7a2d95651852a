use libris::{
    catalog::{Catalog, CatalogError, model::BookDraft},
    config::CatalogConfig,
    filter::ids::IdSet,
    undo::{UndoConfig, UndoCounters, UndoError},
};

fn catalog() -> Catalog {
    Catalog::open_in_memory(&CatalogConfig::default()).expect("open")
}

fn count(catalog: &Catalog, sql: &str) -> i64 {
    catalog.db().query_i64(sql, &[]).expect("count").unwrap_or(0)
}

fn tag_names(catalog: &Catalog, id: i64) -> Vec<String> {
    catalog
        .book_tags(id)
        .expect("tags")
        .into_iter()
        .map(|t| t.name)
        .collect()
}

#[test]
fn add_undo_redo_toggles_visibility() {
    let mut catalog = catalog();
    let id = catalog
        .add_book(&BookDraft::titled("Dune").by("Frank Herbert").tagged("fiction"), |_| false)
        .expect("add");
    assert_eq!(catalog.undo_description().expect("desc").as_deref(), Some("Add book"));

    assert!(catalog.undo().expect("undo"));
    assert!(catalog.get_book(id).expect("get").is_none());
    assert!(catalog.find_tag_by_name("fiction").expect("tag").is_none());
    assert!(!catalog.can_undo());
    assert_eq!(catalog.redo_description().expect("desc").as_deref(), Some("Add book"));

    assert!(catalog.redo().expect("redo"));
    let book = catalog.get_book_and_authors(id).expect("get").expect("book");
    assert_eq!(book.book.title, "Dune");
    assert_eq!(book.sort_last(), "Herbert");
    assert_eq!(tag_names(&catalog, id), vec!["fiction"]);
    assert!(!catalog.can_redo());
}

#[test]
fn update_undo_restores_fields_and_links() {
    let mut catalog = catalog();
    let id = catalog
        .add_book(&BookDraft::titled("Dune").by("Frank Herbert").tagged("fiction"), |_| false)
        .expect("add");
    let original = catalog.get_book(id).expect("get").expect("book");

    let mut draft = BookDraft::titled("Dune Messiah").by("Frank Herbert").tagged("sequel");
    draft.page_count = 256;
    assert!(catalog.update_book(id, &draft).expect("update"));
    assert_eq!(tag_names(&catalog, id), vec!["sequel"]);

    assert!(catalog.undo().expect("undo"));
    let restored = catalog.get_book(id).expect("get").expect("book");
    assert_eq!(restored, original);
    assert_eq!(tag_names(&catalog, id), vec!["fiction"]);
    assert!(catalog.find_tag_by_name("sequel").expect("tag").is_none());

    assert!(catalog.redo().expect("redo"));
    let redone = catalog.get_book(id).expect("get").expect("book");
    assert_eq!(redone.title, "Dune Messiah");
    assert_eq!(redone.page_count, 256);
    assert_eq!(tag_names(&catalog, id), vec!["sequel"]);
    assert_eq!(count(&catalog, "SELECT count(*) FROM books WHERE books_id = -1"), 0);
}

#[test]
fn delete_undo_brings_back_book_and_links() {
    let mut catalog = catalog();
    let id = catalog
        .add_book(
            &BookDraft::titled("Emma")
                .by("Jane Austen")
                .in_category("Novel")
                .with_isbn("9780141439587"),
            |_| false,
        )
        .expect("add");

    assert_eq!(catalog.delete_books(IdSet::Ids(vec![id]), None).expect("delete"), 1);
    assert!(catalog.get_book(id).expect("get").is_none());
    assert_eq!(count(&catalog, "SELECT count(*) FROM book_authors"), 0);

    assert!(catalog.undo().expect("undo"));
    let book = catalog.get_book_and_authors(id).expect("get").expect("book");
    assert_eq!(book.authors.len(), 1);
    assert_eq!(book.categories[0].category, "Novel");
    assert_eq!(book.isbns[0].isbn, "9780141439587");
}

#[test]
fn nested_operations_share_one_generation() {
    let mut catalog = catalog();
    let (a, b) = catalog
        .with_undo("Import", |catalog| {
            let a = catalog.add_book(&BookDraft::titled("A"), |_| false)?;
            let b = catalog.add_book(&BookDraft::titled("B"), |_| false)?;
            Ok((a, b))
        })
        .expect("import");
    assert_eq!(catalog.undo_description().expect("desc").as_deref(), Some("Import"));
    assert_eq!(count(&catalog, "SELECT count(*) FROM undo_transactions"), 1);

    assert!(catalog.undo().expect("undo"));
    assert!(catalog.get_book(a).expect("get").is_none());
    assert!(catalog.get_book(b).expect("get").is_none());
    assert!(!catalog.can_undo());
}

#[test]
fn failed_operation_rolls_back_data_and_log() {
    let mut catalog = catalog();
    catalog.add_book(&BookDraft::titled("Kept"), |_| false).expect("add");
    let before = catalog.undo_log().counters();

    let result: Result<(), CatalogError> = catalog.with_undo("Broken", |catalog| {
        catalog.add_book(&BookDraft::titled("Lost"), |_| false)?;
        Err(UndoError::IllegalRecording.into())
    });
    assert!(result.is_err());
    assert_eq!(catalog.undo_log().counters(), before);
    assert!(!catalog.undo_log().is_recording());
    assert_eq!(count(&catalog, "SELECT count(*) FROM books"), 1);
    assert_eq!(count(&catalog, "SELECT count(*) FROM undo_transactions"), 1);
    assert_eq!(catalog.undo_description().expect("desc").as_deref(), Some("Add book"));
}

#[test]
fn empty_generation_leaves_history_alone() {
    let mut catalog = catalog();
    catalog.add_book(&BookDraft::titled("A"), |_| false).expect("add");
    assert!(catalog.undo().expect("undo"));

    catalog.with_undo("Nothing", |_| Ok(())).expect("empty");
    assert!(catalog.can_redo());
    assert_eq!(count(&catalog, "SELECT count(*) FROM undo_transactions"), 1);
}

#[test]
fn new_work_discards_redo_history() {
    let mut catalog = catalog();
    let a = catalog.add_book(&BookDraft::titled("A"), |_| false).expect("add");
    assert!(catalog.undo().expect("undo"));
    catalog.add_book(&BookDraft::titled("B"), |_| false).expect("add");

    assert!(!catalog.can_redo());
    assert!(!catalog.redo().expect("redo"));
    assert_eq!(
        catalog
            .db()
            .query_i64("SELECT count(*) FROM books WHERE books_id = ?", &[a.into()])
            .expect("count"),
        Some(0)
    );
    assert_eq!(count(&catalog, "SELECT count(*) FROM undo_transactions"), 1);
}

#[test]
fn undo_and_redo_at_the_ends_do_nothing() {
    let mut catalog = catalog();
    assert!(!catalog.undo().expect("undo"));
    assert!(!catalog.redo().expect("redo"));
    assert_eq!(catalog.undo_description().expect("desc"), None);
    assert_eq!(catalog.redo_description().expect("desc"), None);
}

#[test]
fn disabled_log_deletes_physically() {
    let config = CatalogConfig {
        undo: UndoConfig {
            max_undo_levels: 0,
            ..UndoConfig::default()
        },
        ..CatalogConfig::default()
    };
    let mut catalog = Catalog::open_in_memory(&config).expect("open");
    let id = catalog
        .add_book(&BookDraft::titled("Gone").tagged("temp"), |_| false)
        .expect("add");
    assert!(!catalog.can_undo());

    let mut draft = BookDraft::titled("Renamed");
    draft.tags.push("temp".to_string());
    assert!(catalog.update_book(id, &draft).expect("update"));
    assert_eq!(count(&catalog, "SELECT count(*) FROM books"), 1);

    assert_eq!(catalog.delete_books(IdSet::Ids(vec![id]), None).expect("delete"), 1);
    assert_eq!(count(&catalog, "SELECT count(*) FROM books"), 0);
    assert_eq!(count(&catalog, "SELECT count(*) FROM undo_operations"), 0);
}

#[test]
fn missing_generation_resyncs_the_counters() {
    let mut catalog = catalog();
    let first = catalog.add_book(&BookDraft::titled("A"), |_| false).expect("add");
    let second = catalog.add_book(&BookDraft::titled("B"), |_| false).expect("add");
    catalog
        .db()
        .execute("DELETE FROM undo_transactions WHERE transaction_undo_id = 2", &[])
        .expect("drop generation");

    assert!(!catalog.undo().expect("undo"));
    assert_eq!(
        catalog.undo_log().counters(),
        UndoCounters {
            min_undo_id: 1,
            undo_id: 1,
            max_undo_id: 1,
        }
    );
    assert!(catalog.undo().expect("undo"));
    assert!(catalog.get_book(first).expect("get").is_none());
    assert!(catalog.get_book(second).expect("get").is_some());

    assert!(catalog.redo().expect("redo"));
    assert!(catalog.undo().expect("undo"));
    catalog
        .db()
        .execute("DELETE FROM undo_transactions WHERE transaction_undo_id = 1", &[])
        .expect("drop generation");
    assert!(!catalog.redo().expect("redo"));
    assert!(!catalog.can_undo());
    assert!(!catalog.can_redo());
}

#[test]
fn lookups_without_books_are_dropped_and_restored() {
    let mut catalog = catalog();
    let visible_authors = "SELECT count(*) FROM authors WHERE ( authors_flags & 2 ) = 0";
    let visible_categories = "SELECT count(*) FROM categories WHERE ( categories_flags & 2 ) = 0";
    let visible_isbns = "SELECT count(*) FROM isbns WHERE ( isbns_flags & 2 ) = 0";

    let id = catalog
        .add_book(
            &BookDraft::titled("Old").by("Ann Old").in_category("Gone").with_isbn("111"),
            |_| false,
        )
        .expect("add");
    let shared = catalog
        .add_book(&BookDraft::titled("Shared").by("Ben New"), |_| false)
        .expect("add");

    assert!(catalog.update_book(id, &BookDraft::titled("New").by("Ben New")).expect("update"));
    assert_eq!(count(&catalog, visible_authors), 1);
    assert_eq!(count(&catalog, visible_categories), 0);
    assert_eq!(count(&catalog, visible_isbns), 0);

    assert_eq!(catalog.delete_books(IdSet::Ids(vec![id]), None).expect("delete"), 1);
    assert_eq!(count(&catalog, visible_authors), 1);
    assert_eq!(catalog.delete_books(IdSet::Ids(vec![shared]), None).expect("delete"), 1);
    assert_eq!(count(&catalog, visible_authors), 0);

    assert!(catalog.undo().expect("undo"));
    assert!(catalog.undo().expect("undo"));
    assert_eq!(count(&catalog, visible_authors), 1);
    assert!(catalog.undo().expect("undo"));
    let book = catalog.get_book_and_authors(id).expect("get").expect("book");
    assert_eq!(book.sort_last(), "Old");
    assert_eq!(book.categories[0].category, "Gone");
    assert_eq!(book.isbns[0].isbn, "111");
    assert_eq!(count(&catalog, visible_authors), 2);
    assert_eq!(count(&catalog, visible_isbns), 1);
}

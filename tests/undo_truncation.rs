use libris::{
    catalog::{Catalog, model::BookDraft},
    config::CatalogConfig,
    filter::ids::IdSet,
    undo::{UndoConfig, UndoCounters},
};

fn catalog_with(max_undo_levels: i64, reset_undo_at: i64) -> Catalog {
    let config = CatalogConfig {
        undo: UndoConfig {
            max_undo_levels,
            reset_undo_at,
        },
        ..CatalogConfig::default()
    };
    Catalog::open_in_memory(&config).expect("open")
}

fn add_books(catalog: &mut Catalog, n: usize) -> Vec<i64> {
    (0..n)
        .map(|i| {
            catalog
                .add_book(&BookDraft::titled(format!("Book {i}")), |_| false)
                .expect("add")
        })
        .collect()
}

fn visible(catalog: &Catalog, ids: &[i64]) -> Vec<bool> {
    ids.iter()
        .map(|id| catalog.get_book(*id).expect("get").is_some())
        .collect()
}

fn undo_id_range(catalog: &Catalog) -> (i64, i64) {
    let db = catalog.db();
    (
        db.query_i64("SELECT min(transaction_undo_id) FROM undo_transactions", &[])
            .expect("min")
            .unwrap_or(0),
        db.query_i64("SELECT max(transaction_undo_id) FROM undo_transactions", &[])
            .expect("max")
            .unwrap_or(0),
    )
}

#[test]
fn oldest_generations_fall_off_past_the_depth() {
    let mut catalog = catalog_with(3, 100);
    let ids = add_books(&mut catalog, 5);
    assert_eq!(
        catalog.undo_log().counters(),
        UndoCounters {
            min_undo_id: 3,
            undo_id: 5,
            max_undo_id: 5,
        }
    );

    for _ in 0..3 {
        assert!(catalog.undo().expect("undo"));
    }
    assert!(!catalog.undo().expect("undo"));
    assert_eq!(visible(&catalog, &ids), vec![true, true, false, false, false]);
}

#[test]
fn ids_rebase_at_the_reset_threshold() {
    let mut catalog = catalog_with(2, 4);
    let ids = add_books(&mut catalog, 4);
    assert_eq!(
        catalog.undo_log().counters(),
        UndoCounters {
            min_undo_id: 1,
            undo_id: 2,
            max_undo_id: 2,
        }
    );
    assert_eq!(undo_id_range(&catalog), (1, 2));

    assert!(catalog.undo().expect("undo"));
    assert!(catalog.undo().expect("undo"));
    assert!(!catalog.undo().expect("undo"));
    assert_eq!(visible(&catalog, &ids), vec![true, true, false, false]);

    assert!(catalog.redo().expect("redo"));
    assert_eq!(visible(&catalog, &ids), vec![true, true, true, false]);
}

#[test]
fn lowering_the_depth_truncates_both_ends() {
    let mut catalog = catalog_with(20, 30);
    let ids = add_books(&mut catalog, 5);
    assert!(catalog.undo().expect("undo"));

    catalog.set_max_undo_levels(2, 0).expect("levels");
    assert_eq!(
        catalog.undo_log().counters(),
        UndoCounters {
            min_undo_id: 4,
            undo_id: 4,
            max_undo_id: 5,
        }
    );
    assert_eq!(catalog.undo_config().max_undo_levels, 2);

    assert!(catalog.undo().expect("undo"));
    assert!(!catalog.can_undo());
    assert_eq!(visible(&catalog, &ids), vec![true, true, true, false, false]);

    assert!(catalog.redo().expect("redo"));
    assert!(catalog.redo().expect("redo"));
    assert!(!catalog.can_redo());
}

#[test]
fn zero_depth_clears_everything() {
    let mut catalog = catalog_with(20, 30);
    let ids = add_books(&mut catalog, 3);
    assert!(catalog.undo().expect("undo"));

    catalog.set_max_undo_levels(0, 0).expect("levels");
    assert!(!catalog.can_undo());
    assert!(!catalog.can_redo());
    assert_eq!(undo_id_range(&catalog), (0, 0));
    assert_eq!(
        catalog
            .db()
            .query_i64("SELECT count(*) FROM books", &[])
            .expect("count"),
        Some(2)
    );
    assert_eq!(visible(&catalog, &ids), vec![true, true, false]);

    catalog.add_book(&BookDraft::titled("Untracked"), |_| false).expect("add");
    assert!(!catalog.can_undo());
}

#[test]
fn reopening_keeps_a_valid_log_and_drops_a_broken_one() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("catalog.db");
    let config = CatalogConfig::default();

    let mut catalog = Catalog::open(&path, &config).expect("open");
    let ids = add_books(&mut catalog, 2);
    assert!(catalog.undo().expect("undo"));
    catalog.close().expect("close");

    let catalog = Catalog::open(&path, &config).expect("reopen");
    assert_eq!(
        catalog.undo_log().counters(),
        UndoCounters {
            min_undo_id: 1,
            undo_id: 1,
            max_undo_id: 2,
        }
    );
    assert_eq!(catalog.redo_description().expect("desc").as_deref(), Some("Add book"));
    catalog.close().expect("close");

    {
        let conn = rusqlite::Connection::open(&path).expect("raw open");
        conn.execute(
            "UPDATE undo_transactions SET transaction_undo_id = 7 WHERE transaction_undo_id = 2",
            [],
        )
        .expect("corrupt");
    }

    let catalog = Catalog::open(&path, &config).expect("reopen");
    assert!(!catalog.can_undo());
    assert!(!catalog.can_redo());
    assert_eq!(undo_id_range(&catalog), (0, 0));
    assert_eq!(visible(&catalog, &ids), vec![true, false]);
    assert_eq!(
        catalog
            .db()
            .query_i64("SELECT count(*) FROM books", &[])
            .expect("count"),
        Some(1)
    );
}

#[test]
fn truncated_deletes_and_changes_are_purged() {
    let mut catalog = catalog_with(2, 100);
    let kept = catalog.add_book(&BookDraft::titled("Keep"), |_| false).expect("add");
    let doomed = catalog
        .add_book(&BookDraft::titled("Doomed").by("Ann Old"), |_| false)
        .expect("add");
    assert!(catalog.update_book(kept, &BookDraft::titled("Kept")).expect("update"));
    assert_eq!(
        catalog.delete_books(IdSet::Ids(vec![doomed]), None).expect("delete"),
        1
    );
    let count = |catalog: &Catalog, sql: &str| {
        catalog.db().query_i64(sql, &[]).expect("count").unwrap_or(0)
    };
    assert_eq!(count(&catalog, "SELECT count(*) FROM books"), 3);
    assert_eq!(count(&catalog, "SELECT count(*) FROM authors"), 1);

    add_books(&mut catalog, 2);
    assert_eq!(
        catalog.undo_log().counters(),
        UndoCounters {
            min_undo_id: 5,
            undo_id: 6,
            max_undo_id: 6,
        }
    );
    assert_eq!(
        count(&catalog, &format!("SELECT count(*) FROM books WHERE books_id = {doomed}")),
        0
    );
    assert_eq!(count(&catalog, "SELECT count(*) FROM books WHERE title = 'Keep'"), 0);
    assert_eq!(count(&catalog, "SELECT count(*) FROM authors"), 0);
    assert_eq!(count(&catalog, "SELECT count(*) FROM books"), 3);
    assert_eq!(catalog.get_book(kept).expect("get").expect("book").title, "Kept");
}

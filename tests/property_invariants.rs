use proptest::prelude::*;

use libris::{
    catalog::{Catalog, model::{BookDraft, BookRecord}},
    config::CatalogConfig,
    db::tables::BOOKS,
    filter::{Column, DateLocale, Filter, FilterField, Predicate, compile, ids::IdSet},
    types::BookId,
    undo::UndoConfig,
};

const TITLES: [&str; 6] = ["Dune", "Emma", "Cosmos", "Beloved", "Ulysses", "Kindred"];
const TAGS: [&str; 4] = ["fiction", "sf", "classic", "to-read"];
const VALUES: [&str; 7] = ["1", "300", "abc", "2024", "March 2024", "03/01/2024", "50%_off"];

#[derive(Debug, Clone)]
enum Action {
    Add { title: u8, tag: u8 },
    Update { target: u8, title: u8, pages: u16 },
    Delete { target: u8 },
    Tag { target: u8, tag: u8 },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0u8..6, 0u8..4).prop_map(|(title, tag)| Action::Add { title, tag }),
        (0u8..16, 0u8..6, 0u16..900)
            .prop_map(|(target, title, pages)| Action::Update { target, title, pages }),
        (0u8..16).prop_map(|target| Action::Delete { target }),
        (0u8..16, 0u8..4).prop_map(|(target, tag)| Action::Tag { target, tag }),
    ]
}

fn field_strategy() -> impl Strategy<Value = FilterField> {
    (
        0usize..Column::ALL.len(),
        0usize..Predicate::ALL.len(),
        prop::collection::vec(0usize..VALUES.len(), 0..4),
    )
        .prop_map(|(column, predicate, values)| {
            FilterField::new(
                Column::ALL[column],
                Predicate::ALL[predicate],
                values.into_iter().map(|v| VALUES[v]),
            )
        })
}

fn deep_catalog() -> Catalog {
    let config = CatalogConfig {
        undo: UndoConfig {
            max_undo_levels: 1000,
            reset_undo_at: 2000,
        },
        ..CatalogConfig::default()
    };
    Catalog::open_in_memory(&config).expect("open")
}

fn pick(ids: &[BookId], target: u8) -> Option<BookId> {
    if ids.is_empty() {
        None
    } else {
        Some(ids[usize::from(target) % ids.len()])
    }
}

fn snapshot(catalog: &Catalog) -> Vec<(BookRecord, Vec<String>)> {
    catalog
        .book_ids(None)
        .expect("ids")
        .into_iter()
        .map(|id| {
            let book = catalog.get_book(id).expect("get").expect("book");
            let tags = catalog
                .book_tags(id)
                .expect("tags")
                .into_iter()
                .map(|tag| tag.name)
                .collect();
            (book, tags)
        })
        .collect()
}

fn apply(catalog: &mut Catalog, action: &Action) {
    let ids = catalog.book_ids(None).expect("ids");
    match *action {
        Action::Add { title, tag } => {
            let draft =
                BookDraft::titled(TITLES[usize::from(title)]).tagged(TAGS[usize::from(tag)]);
            catalog.add_book(&draft, |_| false).expect("add");
        }
        Action::Update { target, title, pages } => {
            if let Some(id) = pick(&ids, target) {
                let mut draft = BookDraft::titled(TITLES[usize::from(title)]);
                draft.page_count = i64::from(pages);
                assert!(catalog.update_book(id, &draft).expect("update"));
            }
        }
        Action::Delete { target } => {
            if let Some(id) = pick(&ids, target) {
                assert_eq!(catalog.delete_books(IdSet::Ids(vec![id]), None).expect("delete"), 1);
            }
        }
        Action::Tag { target, tag } => {
            if let Some(id) = pick(&ids, target) {
                let tag = catalog.find_or_add_tag(TAGS[usize::from(tag)]).expect("tag");
                catalog.tag_books(IdSet::Ids(vec![id]), &[tag]).expect("link");
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn undo_all_then_redo_all_restores_the_catalog(
        actions in prop::collection::vec(action_strategy(), 1..40),
    ) {
        let mut catalog = deep_catalog();
        for action in &actions {
            apply(&mut catalog, action);
        }
        let target = snapshot(&catalog);

        while catalog.undo().expect("undo") {}
        prop_assert!(snapshot(&catalog).is_empty());
        prop_assert!(!catalog.can_undo());

        while catalog.redo().expect("redo") {}
        prop_assert!(!catalog.can_redo());
        prop_assert_eq!(snapshot(&catalog), target);
    }

    #[test]
    fn undo_then_redo_is_a_no_op(actions in prop::collection::vec(action_strategy(), 1..25)) {
        let mut catalog = deep_catalog();
        for action in &actions {
            apply(&mut catalog, action);
        }
        let target = snapshot(&catalog);
        let counters = catalog.undo_log().counters();

        if catalog.undo().expect("undo") {
            prop_assert!(catalog.redo().expect("redo"));
        }
        prop_assert_eq!(catalog.undo_log().counters(), counters);
        prop_assert_eq!(snapshot(&catalog), target);
    }

    #[test]
    fn compiled_placeholders_match_arguments(
        fields in prop::collection::vec(field_strategy(), 0..6),
    ) {
        let filter = Filter::new(vec![], fields);
        let compiled = compile(&filter, &BOOKS, &DateLocale::en_us());
        prop_assert_eq!(compiled.command.matches('?').count(), compiled.args.len());
        prop_assert!(compiled.command.contains("( ( books_flags & 2 ) = 0 )"));
    }

    #[test]
    fn compiled_filters_run_against_sqlite(
        fields in prop::collection::vec(field_strategy(), 0..4),
    ) {
        let catalog = deep_catalog();
        let filter = Filter::new(vec![], fields);
        prop_assert!(catalog.query_books(&filter).expect("query").is_empty());
    }
}

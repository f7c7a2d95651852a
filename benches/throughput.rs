use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use libris::{
    catalog::{Catalog, model::BookDraft},
    config::CatalogConfig,
    db::tables::BOOKS,
    filter::{Column, DateLocale, Filter, FilterField, Order, OrderField, Predicate, compile},
};

fn draft(i: u64) -> BookDraft {
    let mut draft = BookDraft::titled(format!("Book {i}"))
        .by(&format!("Author{} Writer", i % 97))
        .tagged(format!("tag{}", i % 13));
    draft.page_count = (i % 900) as i64;
    draft
}

fn seeded(n: u64) -> Catalog {
    let mut catalog = Catalog::open_in_memory(&CatalogConfig::default()).expect("open");
    catalog
        .with_undo("Seed", |catalog| {
            for i in 0..n {
                catalog.add_book(&draft(i), |_| false)?;
            }
            Ok(())
        })
        .expect("seed");
    catalog
}

fn busy_filter() -> Filter {
    Filter::new(
        vec![
            OrderField::new(Column::LastName, Order::Ascending),
            OrderField::new(Column::Title, Order::Descending),
        ],
        vec![
            FilterField::new(Column::Any, Predicate::Glob, ["book"]),
            FilterField::new(Column::Tags, Predicate::NotOneOf, ["tag1", "tag2"]),
            FilterField::new(Column::PageCount, Predicate::Gt, ["100"]),
            FilterField::new(Column::DateAdded, Predicate::OneOf, ["March 2024", "2025"]),
        ],
    )
}

fn bench_compile(c: &mut Criterion) {
    let filter = busy_filter();
    let locale = DateLocale::en_us();
    c.bench_function("compile_filter", |b| {
        b.iter(|| compile(&filter, &BOOKS, &locale));
    });
}

fn bench_add_undo(c: &mut Criterion) {
    c.bench_function("add_book_1k_then_undo", |b| {
        b.iter(|| {
            let mut catalog = Catalog::open_in_memory(&CatalogConfig::default()).expect("open");
            for i in 0..1_000u64 {
                catalog.add_book(&draft(i), |_| false).expect("add");
            }
            while catalog.undo().expect("undo") {}
        });
    });
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_books");
    let filter = busy_filter();
    for n in [100u64, 1_000, 5_000] {
        let catalog = seeded(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| catalog.query_books(&filter).expect("query"));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_add_undo, bench_query);
criterion_main!(benches);

use libris::filter::{
    Column, Filter, FilterField, Order, OrderField, Predicate, SelectionType,
    filter_for_selection_type,
};

fn sample() -> Filter {
    Filter::new(
        vec![
            OrderField::new(Column::LastName, Order::Ascending).with_headers(true),
            OrderField::new(Column::DateAdded, Order::Descending),
        ],
        vec![
            FilterField::new(Column::Tags, Predicate::OneOf, ["fiction", "sf"]),
            FilterField::new(Column::Rating, Predicate::Ge, ["3.5"]),
        ],
    )
}

#[test]
fn envelope_round_trips() {
    let filter = sample();
    let text = filter.encode().expect("encode");
    let back = Filter::decode(&text).expect("decode").expect("filter");
    assert_eq!(back, filter);
    assert!(back.is_same_query(&filter));
}

#[test]
fn unknown_version_or_missing_filter_decodes_to_none() {
    assert_eq!(
        Filter::decode(r#"{"VERSION":1,"FILTER":{"orderList":[],"filterList":[]}}"#)
            .expect("decode"),
        None
    );
    assert_eq!(Filter::decode(r#"{"VERSION":0}"#).expect("decode"), None);
    assert_eq!(Filter::decode(r#"{"FILTER":{}}"#).expect("decode"), None);
}

#[test]
fn malformed_json_is_an_error() {
    assert!(Filter::decode("{\"VERSION\":0,").is_err());
    let unknown_column =
        r#"{"VERSION":0,"FILTER":{"orderList":[{"column":"NOPE"}],"filterList":[]}}"#;
    assert!(Filter::decode(unknown_column).is_err());
}

#[test]
fn hand_written_envelope_decodes() {
    let text = r#"{
        "VERSION": 0,
        "FILTER": {
            "orderList": [{"column": "TITLE", "order": "Ascending", "headers": false}],
            "filterList": [{"column": "ANY", "predicate": "GLOB", "values": ["cat"]}]
        }
    }"#;
    let filter = Filter::decode(text).expect("decode").expect("filter");
    assert_eq!(filter.order_list, vec![OrderField::new(Column::Title, Order::Ascending)]);
    assert_eq!(
        filter.filter_list,
        vec![FilterField::new(Column::Any, Predicate::Glob, ["cat"])]
    );
}

#[test]
fn same_query_compares_every_field_in_order() {
    let filter = sample();
    let mut reordered = sample();
    reordered.filter_list.reverse();
    assert!(!filter.is_same_query(&reordered));

    let mut other_values = sample();
    other_values.filter_list[0].values = vec!["fiction".to_string()];
    assert!(!filter.is_same_query(&other_values));

    let mut headers = sample();
    headers.order_list[0].headers = false;
    assert!(!filter.is_same_query(&headers));
    assert!(filter.is_same_query(&sample()));
}

#[test]
fn selection_type_follows_marked_fields() {
    let base = sample();
    assert_eq!(base.selection_type(), SelectionType::Either);

    let selected = filter_for_selection_type(Some(&base), SelectionType::Selected).expect("filter");
    assert_eq!(selected.selection_type(), SelectionType::Selected);
    assert_eq!(selected.order_list, base.order_list);
    assert_eq!(selected.filter_list.len(), base.filter_list.len() + 1);

    let unselected =
        filter_for_selection_type(Some(&selected), SelectionType::Unselected).expect("filter");
    assert_eq!(unselected.selection_type(), SelectionType::Unselected);
    assert_eq!(unselected.filter_list.len(), base.filter_list.len() + 1);

    let either =
        filter_for_selection_type(Some(&unselected), SelectionType::Either).expect("filter");
    assert_eq!(either, base);

    let mut both = selected.clone();
    both.filter_list
        .push(FilterField::new(Column::Selected, Predicate::NotOneOf, ["0"]));
    assert_eq!(both.selection_type(), SelectionType::None);

    assert_eq!(filter_for_selection_type(None, SelectionType::Either), None);
}

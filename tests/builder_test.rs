//! Tests for TreeBuilder

use std::sync::Arc;

use serde_json::{json, Value};

use formtree::domain::{
    BuildError, DeclShorthand, FieldArena, FieldDecl, FieldKind, FieldList, FieldRegistry,
    FieldType, TextType, TreeBuilder,
};

fn build(list: &FieldList) -> FieldArena {
    let registry = FieldRegistry::default();
    TreeBuilder::new(&registry)
        .build(list)
        .expect("build field tree")
}

fn build_err(list: &FieldList) -> BuildError {
    let registry = FieldRegistry::default();
    TreeBuilder::new(&registry)
        .build(list)
        .expect_err("build should fail")
}

fn child_names(arena: &FieldArena, path: Option<&str>) -> Vec<String> {
    let idx = match path {
        Some(p) => arena.resolve(p).expect("resolve container"),
        None => arena.root(),
    };
    arena
        .children_of(idx)
        .iter()
        .filter_map(|&child| arena.get(child).map(|node| node.name.clone()))
        .collect()
}

#[test]
fn given_flat_declarations_when_building_then_children_attach_in_sequence() {
    // Arrange
    let list = FieldList::from_decls(vec![
        FieldDecl::new("username", "Text"),
        FieldDecl::new("age", "Integer"),
        FieldDecl::new("active", "Boolean"),
    ]);

    // Act
    let arena = build(&list);

    // Assert
    assert_eq!(child_names(&arena, None), vec!["username", "age", "active"]);
    let age = arena.get(arena.resolve("age").unwrap()).unwrap();
    assert_eq!(age.type_name, "Integer");
    assert_eq!(age.kind, FieldKind::Scalar);
}

#[test]
fn given_child_declared_before_parent_when_building_then_depth_grouping_resolves_it() {
    // Arrange
    let list = FieldList::from_decls(vec![
        FieldDecl::new("employer.address.city", "Text"),
        FieldDecl::new("employer.address", "Compound"),
        FieldDecl::new("employer", "Compound"),
    ]);

    // Act
    let arena = build(&list);

    // Assert
    assert!(arena.resolve("employer.address.city").is_some());
    assert_eq!(arena.depth(), 4);
}

#[test]
fn given_missing_parent_when_building_then_unknown_parent_error() {
    let err = build_err(&FieldList::from_decls(vec![FieldDecl::new(
        "employer.name",
        "Text",
    )]));

    assert!(matches!(
        err,
        BuildError::UnknownParent { field, parent }
            if field == "employer.name" && parent == "employer"
    ));
}

#[test]
fn given_scalar_parent_when_building_then_invalid_parent_type_error() {
    // Arrange
    let list = FieldList::from_decls(vec![
        FieldDecl::new("username", "Text"),
        FieldDecl::new("username.first", "Text"),
    ]);

    // Act
    let err = build_err(&list);

    // Assert
    assert!(matches!(
        err,
        BuildError::InvalidParentType { field, parent }
            if field == "username.first" && parent == "username"
    ));
}

#[test]
fn given_unknown_type_when_building_then_unresolved_type_error() {
    let err = build_err(&FieldList::from_decls(vec![FieldDecl::new(
        "flavor", "Banana",
    )]));

    assert!(matches!(
        err,
        BuildError::UnresolvedFieldType { field, type_name }
            if field == "flavor" && type_name == "Banana"
    ));
}

#[test]
fn given_error_in_last_record_when_building_then_no_tree_is_returned() {
    // Arrange
    let list = FieldList::from_decls(vec![
        FieldDecl::new("username", "Text"),
        FieldDecl::new("employer", "Compound"),
        FieldDecl::new("flavor", "Banana"),
    ]);
    let registry = FieldRegistry::default();

    // Act
    let result = TreeBuilder::new(&registry).build(&list);

    // Assert: one bad record poisons the whole build
    assert!(result.is_err());
}

#[test]
fn given_empty_field_name_when_building_then_unnamed_field_error() {
    let list = FieldList::from_decls(vec![
        FieldDecl::new("username", "Text"),
        FieldDecl::untyped(""),
    ]);

    let err = build_err(&list);

    assert!(matches!(err, BuildError::UnnamedField { position: 1 }));
}

#[test]
fn given_plus_redeclaration_when_building_then_attributes_merge_in_place() {
    // Arrange
    let list = FieldList::from_decls(vec![
        FieldDecl::new("username", "Text").attr("label", "Login"),
        FieldDecl::untyped("+username").attr("required", true),
    ]);

    // Act
    let arena = build(&list);

    // Assert: one slot, merged attributes, original type kept
    assert_eq!(child_names(&arena, None), vec!["username"]);
    let node = arena.get(arena.resolve("username").unwrap()).unwrap();
    assert_eq!(node.type_name, "Text");
    assert_eq!(node.label.as_deref(), Some("Login"));
    assert!(node.required);
}

#[test]
fn given_update_with_unresolvable_type_when_building_then_unresolved_type_error() {
    // Arrange: the update names a type even though it cannot change one
    let list = FieldList::from_decls(vec![
        FieldDecl::new("username", "Text"),
        FieldDecl::new("+username", "Banana").attr("required", true),
    ]);

    // Act
    let err = build_err(&list);

    // Assert
    assert!(matches!(
        err,
        BuildError::UnresolvedFieldType { field, type_name }
            if field == "username" && type_name == "Banana"
    ));
}

#[test]
fn given_update_with_known_type_when_building_then_existing_binding_is_kept() {
    let list = FieldList::from_decls(vec![
        FieldDecl::new("username", "Text"),
        FieldDecl::new("+username", "Integer").attr("required", true),
    ]);

    let arena = build(&list);

    let node = arena.get(arena.resolve("username").unwrap()).unwrap();
    assert_eq!(node.type_name, "Text");
    assert!(node.required);
}

#[test]
fn given_template_update_with_unresolvable_type_when_building_then_unresolved_type_error() {
    // Arrange
    let list = FieldList::from_decls(vec![
        FieldDecl::new("emails", "Repeatable"),
        FieldDecl::new("emails.contains", "Email"),
        FieldDecl::new("+emails.contains", "Banana"),
    ]);

    // Act
    let err = build_err(&list);

    // Assert
    assert!(matches!(
        err,
        BuildError::UnresolvedFieldType { field, type_name }
            if field == "emails.contains" && type_name == "Banana"
    ));
}

#[test]
fn given_plain_redeclaration_when_building_then_node_is_replaced() {
    // Arrange
    let list = FieldList::from_decls(vec![
        FieldDecl::new("username", "Text")
            .attr("required", true)
            .attr("order", 5),
        FieldDecl::new("username", "Integer"),
    ]);

    // Act
    let arena = build(&list);

    // Assert: same slot, fresh node without the old attributes
    assert_eq!(child_names(&arena, None), vec!["username"]);
    let node = arena.get(arena.resolve("username").unwrap()).unwrap();
    assert_eq!(node.type_name, "Integer");
    assert!(!node.required);
    assert_eq!(node.order, 1);
}

#[test]
fn given_update_after_explicit_order_when_building_then_order_state_survives() {
    // Arrange
    let list = FieldList::from_decls(vec![
        FieldDecl::new("first", "Text").attr("order", 5),
        FieldDecl::new("second", "Text"),
        FieldDecl::untyped("+first").attr("required", true),
    ]);

    // Act
    let arena = build(&list);

    // Assert
    let first = arena.get(arena.resolve("first").unwrap()).unwrap();
    let second = arena.get(arena.resolve("second").unwrap()).unwrap();
    assert!(first.required);
    assert_eq!(first.order, 5);
    assert_eq!(second.order, 6);
}

#[test]
fn given_template_update_when_building_then_existing_subfields_survive() {
    // Arrange
    let list = FieldList::from_decls(vec![
        FieldDecl::new("addresses", "Repeatable"),
        FieldDecl::new("addresses.street", "Text"),
        FieldDecl::untyped("+addresses.contains").attr("required", true),
    ]);

    // Act
    let arena = build(&list);

    // Assert
    let template = arena.resolve("addresses.contains").expect("template");
    assert!(arena.get(template).unwrap().required);
    assert!(arena.resolve("addresses.contains.street").is_some());
}

#[test]
fn given_template_redeclaration_when_building_then_previous_subfields_drop() {
    // Arrange
    let list = FieldList::from_decls(vec![
        FieldDecl::new("addresses", "Repeatable"),
        FieldDecl::new("addresses.street", "Text"),
        FieldDecl::new("addresses.contains", "Compound"),
    ]);

    // Act
    let arena = build(&list);

    // Assert
    assert!(arena.resolve("addresses.contains").is_some());
    assert!(arena.resolve("addresses.contains.street").is_none());
}

#[test]
fn given_bare_repeatable_when_building_then_text_template_is_defaulted() {
    let arena = build(&FieldList::from_decls(vec![FieldDecl::new(
        "tags",
        "Repeatable",
    )]));

    let template = arena.resolve("tags.contains").expect("default template");
    let node = arena.get(template).unwrap();
    assert_eq!(node.type_name, "Text");
    assert_eq!(node.kind, FieldKind::Scalar);
}

#[test]
fn given_dotted_children_of_repeatable_when_building_then_compound_template_is_implied() {
    // Arrange
    let list = FieldList::from_decls(vec![
        FieldDecl::new("addresses", "Repeatable"),
        FieldDecl::new("addresses.street", "Text"),
        FieldDecl::new("addresses.city", "Text"),
    ]);

    // Act
    let arena = build(&list);

    // Assert
    let template = arena
        .resolve("addresses.contains")
        .expect("implied template");
    assert_eq!(arena.get(template).unwrap().kind, FieldKind::Compound);
    assert_eq!(
        child_names(&arena, Some("addresses.contains")),
        vec!["street", "city"]
    );
}

#[test]
fn given_explicit_contains_record_when_building_then_template_takes_that_type() {
    let list = FieldList::from_decls(vec![
        FieldDecl::new("emails", "Repeatable"),
        FieldDecl::new("emails.contains", "Email").attr("required", true),
    ]);

    let arena = build(&list);

    let template = arena
        .get(arena.resolve("emails.contains").unwrap())
        .unwrap();
    assert_eq!(template.type_name, "Email");
    assert!(template.required);
}

#[test]
fn given_contains_attribute_as_string_when_building_then_template_is_typed() {
    let list = FieldList::from_decls(vec![
        FieldDecl::new("scores", "Repeatable").attr("contains", "Integer")
    ]);

    let arena = build(&list);

    let template = arena
        .get(arena.resolve("scores.contains").unwrap())
        .unwrap();
    assert_eq!(template.type_name, "Integer");
}

#[test]
fn given_contains_attribute_as_map_when_building_then_template_carries_attrs() {
    let list = FieldList::from_decls(vec![FieldDecl::new("emails", "Repeatable")
        .attr("contains", json!({"type": "Email", "required": true}))]);

    let arena = build(&list);

    let template = arena
        .get(arena.resolve("emails.contains").unwrap())
        .unwrap();
    assert_eq!(template.type_name, "Email");
    assert!(template.required);
}

#[test]
fn given_mixed_order_attrs_when_building_then_unordered_fields_trail_the_explicit_maximum() {
    // Arrange
    let list = FieldList::from_decls(vec![
        FieldDecl::new("second", "Text").attr("order", 2),
        FieldDecl::new("tail", "Text"),
        FieldDecl::new("first", "Text").attr("order", 1),
        FieldDecl::new("last", "Text"),
    ]);

    // Act
    let arena = build(&list);

    // Assert: declaration sequence is kept, the sorted view honors order
    assert_eq!(
        child_names(&arena, None),
        vec!["second", "tail", "first", "last"]
    );
    let sorted: Vec<String> = arena
        .sorted_children(arena.root())
        .iter()
        .filter_map(|&idx| arena.get(idx).map(|node| node.name.clone()))
        .collect();
    assert_eq!(sorted, vec!["first", "second", "tail", "last"]);
    let tail = arena.get(arena.resolve("tail").unwrap()).unwrap();
    assert_eq!(tail.order, 3);
}

#[test]
fn given_explicit_order_at_i64_max_when_building_then_stamping_saturates() {
    // Arrange
    let list = FieldList::from_decls(vec![
        FieldDecl::new("pinned", "Text").attr("order", i64::MAX),
        FieldDecl::new("tail", "Text"),
    ]);

    // Act
    let arena = build(&list);

    // Assert: the stamp clamps instead of wrapping past the pinned field
    let tail = arena.get(arena.resolve("tail").unwrap()).unwrap();
    assert_eq!(tail.order, i64::MAX);
    let sorted: Vec<String> = arena
        .sorted_children(arena.root())
        .iter()
        .filter_map(|&idx| arena.get(idx).map(|node| node.name.clone()))
        .collect();
    assert_eq!(sorted, vec!["pinned", "tail"]);
}

#[test]
fn given_children_placed_before_parent_when_building_then_sibling_set_is_still_stamped() {
    // Arrange
    let list = FieldList::from_decls(vec![
        FieldDecl::new("group.x", "Text"),
        FieldDecl::new("group.y", "Text"),
        FieldDecl::new("group", "Compound"),
    ]);

    // Act
    let arena = build(&list);

    // Assert: every sibling set ends up with usable orders
    let orders: Vec<i64> = arena
        .children_of(arena.resolve("group").unwrap())
        .iter()
        .filter_map(|&idx| arena.get(idx).map(|node| node.order))
        .collect();
    assert_eq!(orders, vec![1, 2]);
}

#[derive(Debug)]
struct AddressBlock;

impl FieldType for AddressBlock {
    fn kind(&self) -> FieldKind {
        FieldKind::Compound
    }

    fn validate(&self, input: &Value) -> Result<Value, String> {
        Ok(input.clone())
    }

    fn field_list(&self) -> Option<FieldList> {
        Some(FieldList::from_decls(vec![
            FieldDecl::new("street", "Text"),
            FieldDecl::new("city", "Text").attr("required", true),
        ]))
    }
}

#[test]
fn given_type_with_field_list_when_building_then_subfields_expand_beneath_it() {
    // Arrange
    let mut registry = FieldRegistry::default();
    registry.register("AddressBlock", Arc::new(AddressBlock));
    let list = FieldList::from_decls(vec![
        FieldDecl::new("home", "AddressBlock"),
        FieldDecl::new("office", "AddressBlock"),
    ]);

    // Act
    let arena = TreeBuilder::new(&registry).build(&list).expect("build");

    // Assert: both expansions land, orders stamped within each set
    assert!(arena.resolve("home.street").is_some());
    assert!(
        arena
            .get(arena.resolve("home.city").unwrap())
            .unwrap()
            .required
    );
    assert_eq!(child_names(&arena, Some("office")), vec!["street", "city"]);
    let street = arena.get(arena.resolve("office.street").unwrap()).unwrap();
    assert_eq!(street.order, 1);
}

#[derive(Debug)]
struct SelfNesting;

impl FieldType for SelfNesting {
    fn kind(&self) -> FieldKind {
        FieldKind::Compound
    }

    fn validate(&self, input: &Value) -> Result<Value, String> {
        Ok(input.clone())
    }

    fn field_list(&self) -> Option<FieldList> {
        Some(FieldList::from_decls(vec![FieldDecl::new(
            "inner",
            "SelfNesting",
        )]))
    }
}

#[test]
fn given_self_nesting_type_when_building_then_cycle_is_detected() {
    // Arrange
    let mut registry = FieldRegistry::default();
    registry.register("SelfNesting", Arc::new(SelfNesting));
    let list = FieldList::from_decls(vec![FieldDecl::new("node", "SelfNesting")]);

    // Act
    let err = TreeBuilder::new(&registry)
        .build(&list)
        .expect_err("nesting must not recurse forever");

    // Assert
    assert!(matches!(
        err,
        BuildError::CycleDetected { type_name } if type_name == "SelfNesting"
    ));
}

#[test]
fn given_registry_namespace_when_building_then_namespaced_type_wins() {
    // Arrange
    let mut registry = FieldRegistry::default();
    registry.register("crm::Text", Arc::new(TextType));
    registry.set_namespace("crm");

    // Act
    let arena = TreeBuilder::new(&registry)
        .build(&FieldList::from_decls(vec![FieldDecl::new("note", "Text")]))
        .expect("build");

    // Assert: the canonical name records the namespaced hit
    let note = arena.get(arena.resolve("note").unwrap()).unwrap();
    assert_eq!(note.type_name, "crm::Text");
}

#[test]
fn given_mixed_declaration_shapes_when_building_then_all_normalize_into_one_tree() {
    // Arrange
    let mut list = FieldList::from_decls(vec![FieldDecl::new("username", "Text")]);
    list.field_map
        .insert("email".to_string(), DeclShorthand::type_name("Email"));
    list.auto_required.push("user_id".to_string());
    list.optional
        .insert("nickname".to_string(), DeclShorthand::type_name("Text"));

    // Act
    let arena = build(&list);

    // Assert: shape order is fields, field_map, auto shapes, keyed maps
    assert_eq!(
        child_names(&arena, None),
        vec!["username", "email", "user_id", "nickname"]
    );
    let user_id = arena.get(arena.resolve("user_id").unwrap()).unwrap();
    assert_eq!(user_id.type_name, "Integer");
    assert!(user_id.required);
    let nickname = arena.get(arena.resolve("nickname").unwrap()).unwrap();
    assert!(!nickname.required);
}

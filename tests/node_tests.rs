mod common;

use common::{status, test_tree};
use hubtree::{HubtreeError, Node, Tree, Value};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::BTreeMap;

#[test]
fn duplicate_child_id_replaces() -> Result<(), Box<dyn std::error::Error>> {
    let parent = Node::new("parent");
    let first = parent.add_new_child("a");
    first.set_status(&status(json!({"gen": 1})), false);

    let second = Node::new("a");
    let replaced = parent.add_child(second.clone())?.ok_or("expected a replaced child")?;

    assert!(Node::ptr_eq(&replaced, &first));
    assert!(first.parent().is_none());
    assert_eq!(parent.child_count(), 1);
    let current = parent.child("a").ok_or("missing child")?;
    assert!(Node::ptr_eq(&current, &second));
    assert!(current.status().is_empty());
    Ok(())
}

#[test]
fn re_adding_the_same_child_is_a_no_op() -> Result<(), Box<dyn std::error::Error>> {
    let parent = Node::new("parent");
    let child = parent.add_new_child("a");
    assert!(parent.add_child(child.clone())?.is_none());
    assert_eq!(parent.child_count(), 1);
    assert!(child.parent().is_some());
    Ok(())
}

#[test]
fn back_references_follow_attachment() -> Result<(), Box<dyn std::error::Error>> {
    let tree = test_tree();
    let hub = tree.node(&["user1", "hub1"])?;

    let parent = hub.parent().ok_or("no parent")?;
    assert_eq!(parent.id(), "user1");
    let owner = hub.tree().ok_or("no tree")?;
    assert!(Node::ptr_eq(owner.root(), tree.root()));
    assert_eq!(hub.version()?, tree.version());
    Ok(())
}

#[test]
fn detached_node_has_no_version() {
    let node = Node::new("loose");
    assert!(matches!(node.version(), Err(HubtreeError::Detached)));
}

#[test]
fn attached_subtree_joins_the_tree() -> Result<(), Box<dyn std::error::Error>> {
    let tree = Tree::new(Node::new("root"));
    let branch = Node::new("user1");
    let leaf = branch.add_new_child("hub1");
    assert!(leaf.tree().is_none());

    tree.root().add_child(branch)?;
    assert!(leaf.tree().is_some());
    Ok(())
}

#[test]
fn child_by_path_resolves_created_paths() -> Result<(), Box<dyn std::error::Error>> {
    let root = Node::new("root");
    let leaf = Node::new("c");
    root.set_child_by_path(leaf.clone(), &["a", "b"])?;

    let found = root.child_by_path(&["a", "b", "c"])?;
    assert!(Node::ptr_eq(&found, &leaf));
    assert!(Node::ptr_eq(&root.child_by_path::<&str>(&[])?, &root));
    assert!(matches!(
        root.child_by_path(&["a", "x", "c"]),
        Err(HubtreeError::NotFound(ref p)) if p == "a/x/c"
    ));
    Ok(())
}

#[test]
fn set_child_by_path_keeps_existing_intermediates() -> Result<(), Box<dyn std::error::Error>> {
    let root = Node::new("root");
    let a = root.add_new_child("a");
    a.add_new_child("keep");

    root.set_child_by_path(Node::new("new"), &["a"])?;

    let a_now = root.child("a").ok_or("missing a")?;
    assert!(Node::ptr_eq(&a_now, &a));
    assert_eq!(a.children_ids(), vec!["keep".to_string(), "new".to_string()]);
    Ok(())
}

#[test]
fn moving_a_child_removes_it_from_the_old_parent() -> Result<(), Box<dyn std::error::Error>> {
    let root = Node::new("root");
    let left = root.add_new_child("left");
    let right = root.add_new_child("right");
    let item = left.add_new_child("item");

    right.add_child(item.clone())?;

    assert_eq!(left.child_count(), 0);
    assert_eq!(right.child_count(), 1);
    assert_eq!(item.parent().map(|p| p.id().to_string()), Some("right".to_string()));
    Ok(())
}

#[test]
fn attaching_an_ancestor_is_a_cycle() {
    let root = Node::new("root");
    let a = root.add_new_child("a");
    let b = a.add_new_child("b");

    assert!(matches!(b.add_child(root.clone()), Err(HubtreeError::Cycle(_))));
    assert!(matches!(a.add_child(a.clone()), Err(HubtreeError::Cycle(_))));
    assert_eq!(root.child_count(), 1);
}

#[test]
fn delete_path_detaches_only_the_removed_subtree() -> Result<(), Box<dyn std::error::Error>> {
    let tree = test_tree();
    let user = tree.node(&["user7"])?;
    let hub = tree.node(&["user7", "hub0"])?;
    let other = tree.node(&["user8"])?;

    let removed = tree.root().delete_path(&["user7"])?.ok_or("nothing removed")?;

    assert!(Node::ptr_eq(&removed, &user));
    assert!(user.parent().is_none());
    assert!(user.tree().is_none());
    assert!(hub.tree().is_none());
    assert_eq!(hub.parent().map(|p| p.id().to_string()), Some("user7".to_string()));

    assert!(other.parent().is_some());
    assert!(other.tree().is_some());
    assert_eq!(tree.root().child_count(), 9);
    Ok(())
}

#[test]
fn delete_path_on_missing_branch_is_a_no_op() -> Result<(), Box<dyn std::error::Error>> {
    let tree = test_tree();
    assert!(tree.root().delete_path(&["nobody", "hub1"])?.is_none());
    assert!(tree.root().delete_path(&["user1", "nobody"])?.is_none());
    assert_eq!(tree.root().child_count(), 10);
    Ok(())
}

#[test]
fn node_values() -> Result<(), Box<dyn std::error::Error>> {
    let tree = test_tree();
    let n = tree.node(&["user2", "hub3"])?;

    n.set_value(json!(34.56))?;
    assert_eq!(n.value().ok_or("no value")?.as_float()?, 34.56);

    n.set_value(json!(true))?;
    assert!(n.value().ok_or("no value")?.as_bool()?);

    n.set_value(json!({"x": 12.34, "y": true}))?;
    let value = n.value().ok_or("no value")?;
    assert_eq!(value.as_map()?.len(), 2);

    assert!(matches!(
        n.set_value(json!(["nope"])),
        Err(HubtreeError::UnsupportedType(_))
    ));
    assert_eq!(n.value(), Some(value));

    assert!(n.clear_value().is_some());
    assert!(n.value().is_none());
    Ok(())
}

#[test]
fn put_value_rejects_non_finite_floats() -> Result<(), Box<dyn std::error::Error>> {
    let node = Node::new("hub");
    node.put_value(Value::Float(1.5))?;

    let nested = Value::Map(BTreeMap::from([("x".to_string(), Value::Float(f64::NAN))]));
    for bad in [Value::Float(f64::NAN), Value::Float(f64::INFINITY), nested] {
        assert!(matches!(
            node.put_value(bad),
            Err(HubtreeError::UnsupportedType(_))
        ));
    }
    assert_eq!(node.value(), Some(Value::Float(1.5)));
    assert!(node.to_json().is_ok());
    Ok(())
}

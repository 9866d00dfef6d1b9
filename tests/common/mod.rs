#![allow(dead_code)]

use hubtree::{Node, StatusMap, Tree};
use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("hubtree=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

/// A root with `user0..user9`, each holding `hub0..hub9`.
pub fn test_tree() -> Tree {
    let tree = Tree::new(Node::new("root"));
    for i in 0..10 {
        let user = tree.root().add_new_child(format!("user{}", i));
        for j in 0..10 {
            user.add_new_child(format!("hub{}", j));
        }
    }
    tree
}

pub fn status(value: serde_json::Value) -> StatusMap {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("status must be an object, got {}", other),
    }
}

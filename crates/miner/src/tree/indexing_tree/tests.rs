use std::path::{Path, PathBuf};

use super::*;
use crate::tree::filter::FilterPatterns;
use crate::types::FileType;

fn p(path: &str) -> PathBuf {
    PathBuf::from(path)
}

fn tree_with_filters() -> IndexingTree {
    IndexingTree::new(IndexFilters::new(FilterPatterns {
        files: vec!["*.tmp".into()],
        directories: vec!["build".into()],
        parent_markers: vec![".nomedia".into()],
        filter_hidden: true,
    }))
}

#[test]
fn add_root_reports_whether_it_added() {
    let mut tree = IndexingTree::default();
    assert!(tree.add_root(Path::new("/a"), DirectoryFlags::RECURSE).is_added());
    assert_eq!(
        tree.add_root(Path::new("/a"), DirectoryFlags::RECURSE),
        AddRootOutcome::Unchanged
    );
    assert_eq!(tree.len(), 1);
    assert!(tree.is_root(Path::new("/a")));
}

#[test]
fn add_root_overwrites_flags_of_exact_match() {
    let mut tree = IndexingTree::default();
    tree.add_root(Path::new("/a"), DirectoryFlags::empty());
    tree.take_events();

    let outcome = tree.add_root(Path::new("/a"), DirectoryFlags::on_demand());
    assert_eq!(
        outcome,
        AddRootOutcome::FlagsUpdated {
            previous: DirectoryFlags::empty()
        }
    );
    assert_eq!(tree.owner_flags(Path::new("/a")), Some(DirectoryFlags::on_demand()));
    assert_eq!(tree.take_events(), vec![TreeEvent::RootUpdated { path: p("/a") }]);
}

#[test]
fn add_root_under_recursive_ancestor_is_rejected() {
    let mut tree = IndexingTree::default();
    tree.add_root(Path::new("/a"), DirectoryFlags::RECURSE);
    tree.take_events();

    let outcome = tree.add_root(Path::new("/a/b"), DirectoryFlags::on_demand());
    assert_eq!(outcome, AddRootOutcome::Covered { ancestor: p("/a") });
    assert!(!tree.is_root(Path::new("/a/b")));
    assert!(tree.take_events().is_empty());
}

#[test]
fn single_roots_may_nest() {
    let mut tree = IndexingTree::default();
    assert!(tree.add_root(Path::new("/a"), DirectoryFlags::empty()).is_added());
    assert!(tree.add_root(Path::new("/a/b"), DirectoryFlags::empty()).is_added());
    assert_eq!(tree.len(), 2);
}

#[test]
fn recursive_root_absorbs_existing_descendants() {
    let mut tree = IndexingTree::default();
    tree.add_root(Path::new("/home/u/Music"), DirectoryFlags::empty());
    tree.add_root(Path::new("/home/u2"), DirectoryFlags::empty());
    tree.take_events();

    assert!(tree.add_root(Path::new("/home/u"), DirectoryFlags::RECURSE).is_added());
    assert_eq!(
        tree.list_roots().into_iter().map(|r| r.path).collect::<Vec<_>>(),
        vec![p("/home/u"), p("/home/u2")]
    );
    assert_eq!(
        tree.take_events(),
        vec![
            TreeEvent::RootAdded {
                path: p("/home/u"),
                flags: DirectoryFlags::RECURSE
            },
            TreeEvent::RootAbsorbed {
                path: p("/home/u/Music"),
                into: p("/home/u")
            },
        ]
    );
}

#[test]
fn no_root_is_below_a_recursive_root() {
    let mut tree = IndexingTree::default();
    let inputs = [
        ("/a/b/c", DirectoryFlags::empty()),
        ("/a", DirectoryFlags::empty()),
        ("/a/b", DirectoryFlags::RECURSE),
        ("/a/b/c/d", DirectoryFlags::RECURSE),
        ("/a", DirectoryFlags::RECURSE),
        ("/x", DirectoryFlags::RECURSE),
    ];
    for (path, flags) in inputs {
        tree.add_root(Path::new(path), flags);
    }

    let roots = tree.list_roots();
    for outer in roots.iter().filter(|r| r.is_recursive()) {
        for inner in &roots {
            assert!(inner.path == outer.path || !inner.path.starts_with(&outer.path));
        }
    }
    assert_eq!(roots.len(), 2);
}

#[test]
fn remove_root_emits_notification() {
    let mut tree = IndexingTree::default();
    tree.add_root(Path::new("/a"), DirectoryFlags::RECURSE | DirectoryFlags::PRESERVE);
    tree.take_events();

    let removed = tree.remove_root(Path::new("/a/")).expect("removed");
    assert_eq!(removed.path, p("/a"));
    assert!(tree.remove_root(Path::new("/a")).is_none());
    assert_eq!(
        tree.take_events(),
        vec![TreeEvent::RootRemoved {
            path: p("/a"),
            flags: DirectoryFlags::RECURSE | DirectoryFlags::PRESERVE
        }]
    );
}

#[test]
fn resolve_owner_prefers_exact_then_recursive_ancestor() {
    let mut tree = IndexingTree::default();
    tree.add_root(Path::new("/r"), DirectoryFlags::RECURSE);
    tree.add_root(Path::new("/s"), DirectoryFlags::empty());

    assert_eq!(tree.resolve_owner(Path::new("/r/x/y")).map(|r| r.path.clone()), Some(p("/r")));
    assert_eq!(tree.resolve_owner(Path::new("/s")).map(|r| r.path.clone()), Some(p("/s")));
    assert!(tree.resolve_owner(Path::new("/s/child")).is_none());
    assert!(tree.resolve_owner(Path::new("/elsewhere")).is_none());
    assert!(tree.resolve_owner(Path::new("/rr")).is_none());
}

#[test]
fn notify_update_on_root_and_child() {
    let mut tree = IndexingTree::default();
    tree.add_root(Path::new("/r"), DirectoryFlags::RECURSE);
    tree.add_root(Path::new("/s"), DirectoryFlags::empty());
    tree.take_events();

    assert!(tree.notify_update(Path::new("/r"), false));
    assert!(tree.notify_update(Path::new("/r/deep/dir"), false));
    assert!(tree.notify_update(Path::new("/s/direct"), false));
    assert!(!tree.notify_update(Path::new("/s/direct/nested"), false));
    assert!(!tree.notify_update(Path::new("/nowhere"), false));

    assert_eq!(
        tree.take_events(),
        vec![
            TreeEvent::RootUpdated { path: p("/r") },
            TreeEvent::ChildUpdated {
                root: p("/r"),
                path: p("/r/deep/dir")
            },
            TreeEvent::ChildUpdated {
                root: p("/s"),
                path: p("/s/direct")
            },
        ]
    );
}

#[test]
fn recursive_notify_reaches_nested_roots() {
    let mut tree = IndexingTree::default();
    tree.add_root(Path::new("/m/one"), DirectoryFlags::empty());
    tree.add_root(Path::new("/m/two"), DirectoryFlags::RECURSE);
    tree.add_root(Path::new("/mm"), DirectoryFlags::RECURSE);
    tree.take_events();

    assert!(tree.notify_update(Path::new("/m"), true));
    assert_eq!(
        tree.take_events(),
        vec![
            TreeEvent::RootUpdated { path: p("/m/one") },
            TreeEvent::RootUpdated { path: p("/m/two") },
        ]
    );
}

#[test]
fn update_all_touches_every_root() {
    let mut tree = IndexingTree::default();
    tree.add_root(Path::new("/a"), DirectoryFlags::RECURSE);
    tree.add_root(Path::new("/b"), DirectoryFlags::empty());
    tree.take_events();

    tree.update_all();
    assert_eq!(tree.take_events().len(), 2);
}

#[test]
fn root_id_is_probed_once() {
    let mut tree = IndexingTree::default();
    tree.add_root(Path::new("/vol"), DirectoryFlags::RECURSE);

    assert_eq!(tree.root_id_lookup(Path::new("/vol/f")), RootIdLookup::Unprobed(p("/vol")));
    assert_eq!(
        tree.record_root_id(Path::new("/vol"), Some("uuid-1".into())),
        Some("uuid-1".to_string())
    );
    assert_eq!(
        tree.record_root_id(Path::new("/vol"), Some("uuid-2".into())),
        Some("uuid-1".to_string())
    );
    assert_eq!(
        tree.root_id_lookup(Path::new("/vol/f")),
        RootIdLookup::Known(Some("uuid-1".to_string()))
    );
    assert_eq!(tree.root_id_lookup(Path::new("/other")), RootIdLookup::Uncovered);
}

#[test]
fn indexable_respects_scope_and_filters() {
    let mut tree = tree_with_filters();
    tree.add_root(Path::new("/r"), DirectoryFlags::RECURSE);
    tree.add_root(Path::new("/s"), DirectoryFlags::empty());
    tree.add_root(Path::new("/r2/.hidden-root"), DirectoryFlags::RECURSE);

    let file = FileInfo::file();
    let dir = FileInfo::directory();
    let hidden = FileInfo {
        is_hidden: true,
        ..FileInfo::file()
    };

    assert!(tree.is_indexable(Path::new("/r/a/b.txt"), &file));
    assert!(!tree.is_indexable(Path::new("/r/a/b.tmp"), &file));
    assert!(!tree.is_indexable(Path::new("/r/build"), &dir));
    assert!(tree.is_indexable(Path::new("/r/build"), &file));
    assert!(!tree.is_indexable(Path::new("/r/.secret"), &hidden));
    assert!(tree.is_indexable(Path::new("/s/top.txt"), &file));
    assert!(!tree.is_indexable(Path::new("/s/sub/deep.txt"), &file));
    assert!(!tree.is_indexable(Path::new("/outside.txt"), &file));
    assert!(tree.is_indexable(
        Path::new("/r2/.hidden-root"),
        &FileInfo {
            file_type: FileType::Directory,
            is_hidden: true,
            ..FileInfo::directory()
        }
    ));
}

#[test]
fn parent_with_marker_is_not_indexable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tree = tree_with_filters();
    assert!(tree.parent_is_indexable(dir.path()));
    std::fs::write(dir.path().join(".nomedia"), b"").expect("marker");
    assert!(!tree.parent_is_indexable(dir.path()));
}

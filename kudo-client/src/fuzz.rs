#![cfg(test)]

use std::collections::HashSet;

use crate::{
    api::{Comment, CommentId, Engagement, EntityRef, Mutation, PostId, UserId},
    CommentNode, CommentTree, DropReason, SyncController,
};

// Few distinct ids, so that generated lists have replies, duplicates and cycles
fn comments(seed: &[(u8, Option<u8>)]) -> Vec<Comment> {
    seed.iter()
        .map(|(id, parent)| {
            let id = format!("c{}", id % 16);
            let parent = parent.map(|p| format!("c{}", p % 16));
            Comment::stub(&id, parent.as_deref())
        })
        .collect()
}

fn check_parents(nodes: &[CommentNode], parent: Option<&CommentId>, seen: &mut HashSet<CommentId>) {
    for n in nodes {
        assert_eq!(n.comment.parent_id.as_ref(), parent);
        assert!(seen.insert(n.comment.id.clone()), "{:?} placed twice", n.comment.id);
        check_parents(&n.replies, Some(&n.comment.id), seen);
    }
}

#[test]
fn tree_is_deterministic() {
    bolero::check!()
        .with_type::<Vec<(u8, Option<u8>)>>()
        .cloned()
        .for_each(|seed| {
            let input = comments(&seed);
            assert_eq!(CommentTree::build(&input), CommentTree::build(&input));
        })
}

#[test]
fn tree_places_or_drops_every_comment_once() {
    bolero::check!()
        .with_type::<Vec<(u8, Option<u8>)>>()
        .cloned()
        .for_each(|seed| {
            let input = comments(&seed);
            let tree = CommentTree::build(&input);

            let mut seen = HashSet::new();
            check_parents(&tree.roots, None, &mut seen);
            assert_eq!(seen.len(), tree.len());
            assert_eq!(tree.len() + tree.dropped.len(), input.len());

            let ids = input.iter().map(|c| &c.id).collect::<HashSet<_>>();
            for d in &tree.dropped {
                if let DropReason::MissingParent(p) = &d.reason {
                    assert!(!ids.contains(p));
                }
            }

            // A comment whose parent chain reaches a top-level comment is never dropped
            for c in &input {
                if c.parent_id.is_none() && !seen.contains(&c.id) {
                    assert!(tree
                        .dropped
                        .iter()
                        .any(|d| d.id == c.id && d.reason == DropReason::DuplicateId));
                }
            }
        })
}

#[test]
fn reverse_rollbacks_restore_the_original() {
    bolero::check!()
        .with_type::<(Vec<(u8, Mutation)>, Vec<Mutation>)>()
        .cloned()
        .for_each(|(seed, mutations)| {
            let me = UserId::from("me");
            let entity = EntityRef::Post(PostId::from("p"));
            let original = seed.iter().fold(Engagement::default(), |e, (u, m)| {
                e.apply(&UserId(format!("u{}", u % 4)), *m)
            });
            let mut s = SyncController::new(me);
            s.load(entity.clone(), original.clone());

            let ids = mutations
                .iter()
                .map(|m| s.begin(entity.clone(), *m).unwrap())
                .collect::<Vec<_>>();
            for id in ids.into_iter().rev() {
                s.roll_back(id).unwrap();
            }
            assert_eq!(s.engagement(&entity), Some(&original));
        })
}

#[test]
fn commits_keep_every_optimistic_change() {
    bolero::check!()
        .with_type::<(Vec<Mutation>, Vec<bool>)>()
        .cloned()
        .for_each(|(mutations, order)| {
            let me = UserId::from("me");
            let entity = EntityRef::Comment(CommentId::from("c"));
            let mut s = SyncController::new(me.clone());
            s.load(entity.clone(), Engagement::default());

            let mut ids = mutations
                .iter()
                .map(|m| s.begin(entity.clone(), *m).unwrap())
                .collect::<Vec<_>>();
            // Commit in a generated order
            for pick_last in order.into_iter().chain(std::iter::repeat(false)) {
                let id = match (ids.is_empty(), pick_last) {
                    (true, _) => break,
                    (false, true) => ids.remove(ids.len() - 1),
                    (false, false) => ids.remove(0),
                };
                s.commit(id).unwrap();
            }

            let expected = mutations
                .iter()
                .fold(Engagement::default(), |e, m| e.apply(&me, *m));
            assert_eq!(s.engagement(&entity), Some(&expected));
            assert_eq!(s.pending().count(), 0);
        })
}

use std::{
    collections::{hash_map, HashMap},
    fmt,
};

use crate::api::{Comment, CommentId};

/// A comment with its replies nested below it
///
/// Threads can be arbitrarily deep, so nothing on this type recurses: dropping,
/// cloning, comparing and printing all go through an explicit stack.
pub struct CommentNode {
    pub comment: Comment,

    /// Direct replies, in the order they were fetched
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    pub fn new(comment: Comment) -> CommentNode {
        CommentNode {
            comment,
            replies: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, self included
    pub fn len(&self) -> usize {
        let mut res = 0;
        let mut stack = vec![self];
        while let Some(n) = stack.pop() {
            res += 1;
            stack.extend(n.replies.iter());
        }
        res
    }

    /// Depth-first search, in the order `walk` would visit the nodes
    pub fn find_in<'a>(nodes: &'a [CommentNode], id: &CommentId) -> Option<&'a CommentNode> {
        let mut stack = nodes.iter().rev().collect::<Vec<_>>();
        while let Some(n) = stack.pop() {
            if n.comment.id == *id {
                return Some(n);
            }
            stack.extend(n.replies.iter().rev());
        }
        None
    }

    /// Depth-first walk over `nodes` and everything below them, with depths
    /// counted from 0 for `nodes` themselves
    pub fn walk_in(nodes: &[CommentNode]) -> Vec<(usize, &CommentNode)> {
        let mut res = Vec::new();
        let mut stack = nodes.iter().rev().map(|r| (0, r)).collect::<Vec<_>>();
        while let Some((depth, node)) = stack.pop() {
            res.push((depth, node));
            stack.extend(node.replies.iter().rev().map(|r| (depth + 1, r)));
        }
        res
    }
}

impl Drop for CommentNode {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.replies);
        while let Some(mut n) = stack.pop() {
            stack.append(&mut n.replies);
        }
    }
}

impl Clone for CommentNode {
    fn clone(&self) -> CommentNode {
        // Post-order: once a node is expanded, its cloned replies are the last
        // `replies.len()` entries of `done`
        let mut done = Vec::new();
        let mut stack = self.replies.iter().rev().map(|r| (r, false)).collect::<Vec<_>>();
        while let Some((n, expanded)) = stack.pop() {
            if expanded {
                let replies = done.split_off(done.len() - n.replies.len());
                done.push(CommentNode {
                    comment: n.comment.clone(),
                    replies,
                });
            } else {
                stack.push((n, true));
                stack.extend(n.replies.iter().rev().map(|r| (r, false)));
            }
        }
        CommentNode {
            comment: self.comment.clone(),
            replies: done,
        }
    }
}

impl PartialEq for CommentNode {
    fn eq(&self, other: &CommentNode) -> bool {
        let mut stack = vec![(self, other)];
        while let Some((a, b)) = stack.pop() {
            if a.comment != b.comment || a.replies.len() != b.replies.len() {
                return false;
            }
            stack.extend(a.replies.iter().zip(b.replies.iter()));
        }
        true
    }
}

impl Eq for CommentNode {}

impl fmt::Debug for CommentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                CommentNode::walk_in(std::slice::from_ref(self))
                    .into_iter()
                    .map(|(depth, n)| (depth, &n.comment)),
            )
            .finish()
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DropReason {
    /// The parent is not in the fetched list (deleted, or on another page)
    MissingParent(CommentId),

    /// Another comment earlier in the list already has this id
    DuplicateId,

    /// Descends from a dropped comment, or sits on a parent cycle
    Unreachable,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DroppedComment {
    pub id: CommentId,
    pub reason: DropReason,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommentTree {
    /// Top-level comments, in the order they were fetched
    pub roots: Vec<CommentNode>,

    /// Comments that could not be placed, in input order
    pub dropped: Vec<DroppedComment>,
}

impl CommentTree {
    /// Threads a flat list of comments
    ///
    /// Replies whose parent is not in `comments` are dropped rather than shown at
    /// the top level, and so is everything below them.
    pub fn build(comments: &[Comment]) -> CommentTree {
        let n = comments.len();
        let mut reasons: Vec<Option<DropReason>> = vec![None; n];

        let mut index = HashMap::with_capacity(n);
        for (i, c) in comments.iter().enumerate() {
            match index.entry(&c.id) {
                hash_map::Entry::Occupied(_) => {
                    tracing::warn!(comment=?c.id, "duplicate comment id, keeping the first one");
                    reasons[i] = Some(DropReason::DuplicateId);
                }
                hash_map::Entry::Vacant(e) => {
                    e.insert(i);
                }
            }
        }

        let mut roots = Vec::new();
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, c) in comments.iter().enumerate() {
            if reasons[i].is_some() {
                continue;
            }
            match &c.parent_id {
                None => roots.push(i),
                Some(p) => match index.get(p) {
                    Some(&parent) => children[parent].push(i),
                    None => {
                        tracing::warn!(comment=?c.id, parent=?p, "dropping reply to a comment that is not loaded");
                        reasons[i] = Some(DropReason::MissingParent(p.clone()));
                    }
                },
            }
        }

        // Assemble bottom-up with an explicit stack, threads can be arbitrarily deep
        let mut built: Vec<Option<CommentNode>> = (0..n).map(|_| None).collect();
        let mut reached = vec![false; n];
        for &root in &roots {
            let mut stack = vec![(root, false)];
            while let Some((i, expanded)) = stack.pop() {
                if expanded {
                    let replies = children[i]
                        .iter()
                        .filter_map(|&c| built[c].take())
                        .collect();
                    built[i] = Some(CommentNode {
                        comment: comments[i].clone(),
                        replies,
                    });
                } else {
                    reached[i] = true;
                    stack.push((i, true));
                    stack.extend(children[i].iter().rev().map(|&c| (c, false)));
                }
            }
        }

        let mut dropped = Vec::new();
        for (i, c) in comments.iter().enumerate() {
            let reason = match reasons[i].take() {
                Some(r) => r,
                None if !reached[i] => {
                    tracing::warn!(comment=?c.id, "dropping comment that hangs off no top-level comment");
                    DropReason::Unreachable
                }
                None => continue,
            };
            dropped.push(DroppedComment {
                id: c.id.clone(),
                reason,
            });
        }

        CommentTree {
            roots: roots.into_iter().filter_map(|r| built[r].take()).collect(),
            dropped,
        }
    }

    /// Number of comments placed in the tree
    pub fn len(&self) -> usize {
        self.roots.iter().map(|r| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn find(&self, id: &CommentId) -> Option<&CommentNode> {
        CommentNode::find_in(&self.roots, id)
    }

    /// Depth-first walk yielding each node with its depth (0 for top-level)
    pub fn walk(&self) -> Vec<(usize, &CommentNode)> {
        CommentNode::walk_in(&self.roots)
    }
}

/// Top-level comments with their replies nested below them
pub fn build_tree(comments: &[Comment]) -> Vec<CommentNode> {
    CommentTree::build(comments).roots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(id: &str, parent: Option<&str>) -> Comment {
        Comment::stub(id, parent)
    }

    fn shape(nodes: &[CommentNode]) -> Vec<(String, Vec<String>)> {
        nodes
            .iter()
            .map(|n| {
                (
                    n.comment.id.0.clone(),
                    n.replies.iter().map(|r| r.comment.id.0.clone()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn chain_with_orphan() {
        let comments = vec![
            c("a", None),
            c("b", Some("a")),
            c("c", Some("b")),
            c("d", Some("zzz")),
        ];
        let tree = CommentTree::build(&comments);
        assert_eq!(tree.roots.len(), 1);
        let a = &tree.roots[0];
        assert_eq!(a.comment.id, CommentId::from("a"));
        assert_eq!(a.replies.len(), 1);
        let b = &a.replies[0];
        assert_eq!(b.comment.id, CommentId::from("b"));
        assert_eq!(b.replies.len(), 1);
        let c = &b.replies[0];
        assert_eq!(c.comment.id, CommentId::from("c"));
        assert!(c.replies.is_empty());
        assert_eq!(
            tree.dropped,
            vec![DroppedComment {
                id: CommentId::from("d"),
                reason: DropReason::MissingParent(CommentId::from("zzz")),
            }]
        );
        assert_eq!(build_tree(&comments), tree.roots);
    }

    #[test]
    fn siblings_keep_encounter_order() {
        let comments = vec![
            c("r1", None),
            c("x", Some("r1")),
            c("r2", None),
            c("y", Some("r1")),
            c("z", Some("r2")),
            c("w", Some("r1")),
        ];
        let tree = build_tree(&comments);
        assert_eq!(
            shape(&tree),
            vec![
                (String::from("r1"), vec![String::from("x"), String::from("y"), String::from("w")]),
                (String::from("r2"), vec![String::from("z")]),
            ]
        );
    }

    #[test]
    fn reply_listed_before_its_parent_is_still_attached() {
        let comments = vec![c("child", Some("parent")), c("parent", None)];
        let tree = CommentTree::build(&comments);
        assert!(tree.dropped.is_empty());
        assert_eq!(
            shape(&tree.roots),
            vec![(String::from("parent"), vec![String::from("child")])]
        );
    }

    #[test]
    fn orphan_takes_its_subtree_with_it() {
        let comments = vec![
            c("a", None),
            c("o", Some("deleted")),
            c("o1", Some("o")),
            c("o2", Some("o1")),
        ];
        let tree = CommentTree::build(&comments);
        assert_eq!(tree.len(), 1);
        assert_eq!(
            tree.dropped
                .iter()
                .map(|d| (d.id.0.as_str(), d.reason.clone()))
                .collect::<Vec<_>>(),
            vec![
                ("o", DropReason::MissingParent(CommentId::from("deleted"))),
                ("o1", DropReason::Unreachable),
                ("o2", DropReason::Unreachable),
            ]
        );
    }

    #[test]
    fn cycles_and_duplicates_are_dropped() {
        let comments = vec![
            c("a", None),
            c("p", Some("q")),
            c("q", Some("p")),
            c("s", Some("s")),
            c("a", Some("p")),
        ];
        let tree = CommentTree::build(&comments);
        assert_eq!(shape(&tree.roots), vec![(String::from("a"), vec![])]);
        assert_eq!(
            tree.dropped.iter().map(|d| d.reason.clone()).collect::<Vec<_>>(),
            vec![
                DropReason::Unreachable,
                DropReason::Unreachable,
                DropReason::Unreachable,
                DropReason::DuplicateId,
            ]
        );
        assert_eq!(tree.len() + tree.dropped.len(), comments.len());
    }

    #[test]
    fn deep_thread_never_recurses() {
        const DEPTH: usize = 100_000;
        let ids = (0..DEPTH).map(|i| format!("c{i}")).collect::<Vec<_>>();
        let comments = ids
            .iter()
            .enumerate()
            .map(|(i, id)| c(id, (i > 0).then(|| ids[i - 1].as_str())))
            .collect::<Vec<_>>();
        let tree = CommentTree::build(&comments);
        assert_eq!(tree.roots.len(), 1);
        assert!(tree.dropped.is_empty());
        assert_eq!(tree.len(), DEPTH);

        let walk = tree.walk();
        assert_eq!(walk.len(), DEPTH);
        assert_eq!(walk.last().map(|(d, _)| *d), Some(DEPTH - 1));
        drop(walk);

        let last = CommentId(ids[DEPTH - 1].clone());
        assert_eq!(tree.find(&last).map(|n| n.comment.id.clone()), Some(last));
        assert!(tree.find(&CommentId::from("zzz")).is_none());

        let copy = tree.clone();
        assert!(copy == tree);
        drop(copy);
        drop(tree);
    }

    #[test]
    fn clone_and_eq_see_the_whole_subtree() {
        let tree = CommentTree::build(&[
            c("a", None),
            c("b", Some("a")),
            c("c", Some("b")),
            c("d", Some("a")),
        ]);
        let copy = tree.clone();
        assert_eq!(copy, tree);
        assert_eq!(shape(&copy.roots), shape(&tree.roots));
        assert_eq!(copy.roots[0].replies[0].replies[0].comment.id, CommentId::from("c"));

        let mut changed = tree.clone();
        changed.roots[0].replies[0].replies[0].comment.content = String::from("edited");
        assert_ne!(changed, tree);
        changed.roots[0].replies[0].replies.clear();
        assert_ne!(changed, tree);

        let leaf = CommentNode::new(c("x", None));
        assert_eq!(format!("{leaf:?}"), format!("[(0, {:?})]", leaf.comment));
    }

    #[test]
    fn walk_and_find() {
        let comments = vec![
            c("a", None),
            c("b", Some("a")),
            c("c", None),
            c("d", Some("b")),
        ];
        let tree = CommentTree::build(&comments);
        assert_eq!(
            tree.walk()
                .into_iter()
                .map(|(d, n)| (d, n.comment.id.0.as_str()))
                .collect::<Vec<_>>(),
            vec![(0, "a"), (1, "b"), (2, "d"), (0, "c")]
        );
        assert_eq!(tree.find(&CommentId::from("d")).map(|n| n.len()), Some(1));
        assert_eq!(tree.find(&CommentId::from("a")).map(|n| n.len()), Some(3));
        assert!(tree.find(&CommentId::from("zzz")).is_none());
    }

    #[test]
    fn empty_input() {
        let tree = CommentTree::build(&[]);
        assert!(tree.is_empty());
        assert!(tree.dropped.is_empty());
    }
}

#![cfg(test)]

use crate::{Engagement, Mutation, ReactionSet, ReactionType, UserId, VoteDirection, VoteSet};

// Small user space so that generated sequences actually hit the same users
fn user(n: u8) -> UserId {
    UserId(format!("u{}", n % 8))
}

fn build_votes(seed: &[(u8, VoteDirection)]) -> VoteSet {
    seed.iter()
        .fold(VoteSet::default(), |v, (u, d)| v.apply_vote(&user(*u), *d))
}

fn build_reactions(seed: &[(u8, ReactionType)]) -> ReactionSet {
    seed.iter()
        .fold(ReactionSet::new(), |r, (u, t)| r.apply_reaction(&user(*u), *t))
}

#[test]
fn double_vote_clears_or_restores() {
    bolero::check!()
        .with_type::<(Vec<(u8, VoteDirection)>, u8, VoteDirection)>()
        .cloned()
        .for_each(|(seed, u, d)| {
            let v = build_votes(&seed);
            let u = user(u);
            let twice = v.apply_vote(&u, d).apply_vote(&u, d);
            if v.vote_of(&u) == Some(d) {
                assert_eq!(twice, v);
            } else {
                assert_eq!(twice.vote_of(&u), None);
                let mut expected = v.clone();
                expected.upvoters.remove(&u);
                expected.downvoters.remove(&u);
                assert_eq!(twice, expected);
            }
        })
}

#[test]
fn vote_sets_stay_disjoint() {
    bolero::check!()
        .with_type::<Vec<(u8, VoteDirection)>>()
        .cloned()
        .for_each(|seed| {
            let mut v = VoteSet::default();
            for (u, d) in seed {
                let u = user(u);
                let before = v.vote_of(&u);
                v = v.apply_vote(&u, d);
                assert!(v.validate().is_ok());
                match before == Some(d) {
                    true => assert_eq!(v.vote_of(&u), None),
                    false => assert_eq!(v.vote_of(&u), Some(d)),
                }
            }
        })
}

#[test]
fn reactions_hold_one_slot_per_user() {
    bolero::check!()
        .with_type::<(Vec<(u8, ReactionType)>, u8, ReactionType)>()
        .cloned()
        .for_each(|(seed, u, t)| {
            let r = build_reactions(&seed);
            let u = user(u);
            let once = r.apply_reaction(&u, t);
            assert!(once.iter().filter(|(who, _)| **who == u).count() <= 1);
            let twice = once.apply_reaction(&u, t);
            if r.reaction_of(&u) == Some(t) {
                assert_eq!(once.reaction_of(&u), None);
                assert_eq!(twice, r);
            } else {
                assert_eq!(once.reaction_of(&u), Some(t));
                assert_eq!(twice.reaction_of(&u), None);
            }
            let total: usize = twice.breakdown().iter().map(|(_, n)| n).sum();
            assert_eq!(total, twice.len());
        })
}

#[test]
fn mutations_only_touch_the_acting_user() {
    bolero::check!()
        .with_type::<(Vec<(u8, Mutation)>, u8, Mutation)>()
        .cloned()
        .for_each(|(seed, u, m)| {
            let e = seed
                .iter()
                .fold(Engagement::default(), |e, (u, m)| e.apply(&user(*u), *m));
            let u = user(u);
            let after = e.apply(&u, m);
            for n in 0..8 {
                let other = user(n);
                if other == u {
                    continue;
                }
                assert_eq!(after.votes.vote_of(&other), e.votes.vote_of(&other));
                assert_eq!(
                    after.reactions.reaction_of(&other),
                    e.reactions.reaction_of(&other)
                );
            }
        })
}

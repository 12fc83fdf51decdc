use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use crate::{Error, UserId};

#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    bolero::generator::TypeGenerator,
    serde::Deserialize,
    serde::Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl FromStr for VoteDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<VoteDirection, Error> {
        match s {
            "up" => Ok(VoteDirection::Up),
            "down" => Ok(VoteDirection::Down),
            _ => Err(Error::InvalidArgument(String::from(
                "Invalid vote type. Use 'up' or 'down'.",
            ))),
        }
    }
}

impl fmt::Display for VoteDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VoteDirection::Up => "up",
            VoteDirection::Down => "down",
        })
    }
}

/// Declaration order is the display priority of reaction emojis
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    bolero::generator::TypeGenerator,
    serde::Deserialize,
    serde::Serialize,
)]
pub enum ReactionType {
    Like,
    Love,
    Haha,
    Wow,
    Sad,
    Angry,
}

impl ReactionType {
    pub const ALL: [ReactionType; 6] = [
        ReactionType::Like,
        ReactionType::Love,
        ReactionType::Haha,
        ReactionType::Wow,
        ReactionType::Sad,
        ReactionType::Angry,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ReactionType::Like => "Like",
            ReactionType::Love => "Love",
            ReactionType::Haha => "Haha",
            ReactionType::Wow => "Wow",
            ReactionType::Sad => "Sad",
            ReactionType::Angry => "Angry",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            ReactionType::Like => "👍",
            ReactionType::Love => "❤️",
            ReactionType::Haha => "😆",
            ReactionType::Wow => "😮",
            ReactionType::Sad => "😢",
            ReactionType::Angry => "😡",
        }
    }
}

impl FromStr for ReactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<ReactionType, Error> {
        ReactionType::ALL
            .into_iter()
            .find(|r| r.name() == s)
            .ok_or_else(|| Error::InvalidArgument(String::from("Invalid reaction type")))
    }
}

impl fmt::Display for ReactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reddit-style votes on one post or comment
///
/// A user is never in both sets at once.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct VoteSet {
    #[serde(rename = "upvotes", default)]
    pub upvoters: BTreeSet<UserId>,
    #[serde(rename = "downvotes", default)]
    pub downvoters: BTreeSet<UserId>,
}

impl VoteSet {
    /// Voting twice in the same direction clears the vote, voting the other way
    /// switches it
    pub fn apply_vote(&self, user: &UserId, direction: VoteDirection) -> VoteSet {
        let was_up = self.upvoters.contains(user);
        let was_down = self.downvoters.contains(user);
        let mut res = self.clone();
        res.upvoters.remove(user);
        res.downvoters.remove(user);
        match direction {
            VoteDirection::Up if !was_up => {
                res.upvoters.insert(user.clone());
            }
            VoteDirection::Down if !was_down => {
                res.downvoters.insert(user.clone());
            }
            _ => (),
        }
        res
    }

    pub fn vote_of(&self, user: &UserId) -> Option<VoteDirection> {
        if self.upvoters.contains(user) {
            Some(VoteDirection::Up)
        } else if self.downvoters.contains(user) {
            Some(VoteDirection::Down)
        } else {
            None
        }
    }

    pub fn upvote_count(&self) -> usize {
        self.upvoters.len()
    }

    pub fn downvote_count(&self) -> usize {
        self.downvoters.len()
    }

    pub fn net_score(&self) -> i64 {
        self.upvote_count() as i64 - self.downvote_count() as i64
    }

    pub fn validate(&self) -> Result<(), Error> {
        match self.upvoters.intersection(&self.downvoters).next() {
            Some(u) => Err(Error::InvalidArgument(format!(
                "user {u} both upvoted and downvoted"
            ))),
            None => Ok(()),
        }
    }
}

/// One element of the backend's `reactions` array
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ReactionEntry {
    pub user: UserId,
    #[serde(rename = "type")]
    pub reaction: ReactionType,
}

/// Facebook-style reactions: at most one reaction per user
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(from = "Vec<ReactionEntry>", into = "Vec<ReactionEntry>")]
pub struct ReactionSet(BTreeMap<UserId, ReactionType>);

impl From<Vec<ReactionEntry>> for ReactionSet {
    fn from(entries: Vec<ReactionEntry>) -> ReactionSet {
        let mut res = BTreeMap::new();
        for e in entries {
            if res.contains_key(&e.user) {
                tracing::warn!(
                    user=?e.user,
                    "multiple reactions from the same user, keeping the first"
                );
                continue;
            }
            res.insert(e.user, e.reaction);
        }
        ReactionSet(res)
    }
}

impl From<ReactionSet> for Vec<ReactionEntry> {
    fn from(set: ReactionSet) -> Vec<ReactionEntry> {
        set.0
            .into_iter()
            .map(|(user, reaction)| ReactionEntry { user, reaction })
            .collect()
    }
}

impl FromIterator<(UserId, ReactionType)> for ReactionSet {
    fn from_iter<I: IntoIterator<Item = (UserId, ReactionType)>>(iter: I) -> ReactionSet {
        ReactionSet(iter.into_iter().collect())
    }
}

impl ReactionSet {
    pub fn new() -> ReactionSet {
        ReactionSet(BTreeMap::new())
    }

    /// Reacting with the current reaction removes it, reacting with another one
    /// replaces it
    pub fn apply_reaction(&self, user: &UserId, reaction: ReactionType) -> ReactionSet {
        let mut res = self.clone();
        match self.0.get(user) {
            Some(r) if *r == reaction => {
                res.0.remove(user);
            }
            _ => {
                res.0.insert(user.clone(), reaction);
            }
        }
        res
    }

    pub fn reaction_of(&self, user: &UserId) -> Option<ReactionType> {
        self.0.get(user).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UserId, ReactionType)> {
        self.0.iter().map(|(u, r)| (u, *r))
    }

    /// Count per reaction type, only for types present, in declaration order
    pub fn breakdown(&self) -> Vec<(ReactionType, usize)> {
        let mut counts = BTreeMap::new();
        for r in self.0.values() {
            *counts.entry(*r).or_insert(0) += 1;
        }
        counts.into_iter().collect()
    }

    /// Reaction types present, in display priority order
    pub fn present_types(&self) -> Vec<ReactionType> {
        self.breakdown().into_iter().map(|(r, _)| r).collect()
    }
}

/// Everything a user can change on a post or comment by tapping
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Engagement {
    #[serde(default)]
    pub votes: VoteSet,
    #[serde(default)]
    pub reactions: ReactionSet,
}

impl Engagement {
    pub fn apply(&self, user: &UserId, mutation: Mutation) -> Engagement {
        match mutation {
            Mutation::Vote(d) => Engagement {
                votes: self.votes.apply_vote(user, d),
                reactions: self.reactions.clone(),
            },
            Mutation::React(r) => Engagement {
                votes: self.votes.clone(),
                reactions: self.reactions.apply_reaction(user, r),
            },
        }
    }

    pub fn score(&self) -> i64 {
        self.votes.net_score()
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, bolero::generator::TypeGenerator)]
pub enum Mutation {
    Vote(VoteDirection),
    React(ReactionType),
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Vote(d) => write!(f, "vote {d}"),
            Mutation::React(r) => write!(f, "react {r}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn votes(up: &[&str], down: &[&str]) -> VoteSet {
        VoteSet {
            upvoters: up.iter().map(|u| UserId::from(*u)).collect(),
            downvoters: down.iter().map(|u| UserId::from(*u)).collect(),
        }
    }

    #[test]
    fn vote_up_then_up_again_clears() {
        let u1 = UserId::from("u1");
        let v = votes(&[], &[]).apply_vote(&u1, VoteDirection::Up);
        assert_eq!(v, votes(&["u1"], &[]));
        let v = v.apply_vote(&u1, VoteDirection::Up);
        assert_eq!(v, votes(&[], &[]));
    }

    #[test]
    fn vote_down_switches_from_up() {
        let u1 = UserId::from("u1");
        let v = votes(&["u1"], &[]).apply_vote(&u1, VoteDirection::Down);
        assert_eq!(v, votes(&[], &["u1"]));
        assert_eq!(v.vote_of(&u1), Some(VoteDirection::Down));
    }

    #[test]
    fn vote_leaves_other_users_alone() {
        let v = votes(&["a", "b"], &["c"]).apply_vote(&UserId::from("c"), VoteDirection::Up);
        assert_eq!(v, votes(&["a", "b", "c"], &[]));
        assert_eq!(v.net_score(), 3);
        let v = v.apply_vote(&UserId::from("d"), VoteDirection::Down);
        assert_eq!(v.upvote_count(), 3);
        assert_eq!(v.downvote_count(), 1);
        assert_eq!(v.net_score(), 2);
    }

    #[test]
    fn validate_rejects_overlap() {
        assert!(votes(&["a"], &["b"]).validate().is_ok());
        assert!(matches!(
            votes(&["a"], &["a"]).validate(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn reaction_switch_then_toggle_off() {
        let u2 = UserId::from("u2");
        let r = ReactionSet::new().apply_reaction(&u2, ReactionType::Like);
        assert_eq!(r.reaction_of(&u2), Some(ReactionType::Like));
        assert_eq!(r.len(), 1);
        let r = r.apply_reaction(&u2, ReactionType::Wow);
        assert_eq!(r.reaction_of(&u2), Some(ReactionType::Wow));
        assert_eq!(r.len(), 1);
        let r = r.apply_reaction(&u2, ReactionType::Wow);
        assert!(r.is_empty());
    }

    #[test]
    fn breakdown_follows_declaration_order() {
        let r: ReactionSet = [
            ("a", ReactionType::Angry),
            ("b", ReactionType::Angry),
            ("c", ReactionType::Angry),
            ("d", ReactionType::Love),
            ("e", ReactionType::Like),
        ]
        .into_iter()
        .map(|(u, r)| (UserId::from(u), r))
        .collect();
        assert_eq!(
            r.breakdown(),
            vec![
                (ReactionType::Like, 1),
                (ReactionType::Love, 1),
                (ReactionType::Angry, 3),
            ]
        );
        assert_eq!(
            r.present_types(),
            vec![ReactionType::Like, ReactionType::Love, ReactionType::Angry]
        );
    }

    #[test]
    fn parse_rejects_unknown_names() {
        assert_eq!("up".parse::<VoteDirection>(), Ok(VoteDirection::Up));
        assert_eq!("down".parse::<VoteDirection>(), Ok(VoteDirection::Down));
        assert!(matches!(
            "sideways".parse::<VoteDirection>(),
            Err(Error::InvalidArgument(_))
        ));
        for r in ReactionType::ALL {
            assert_eq!(r.name().parse::<ReactionType>(), Ok(r));
        }
        assert!(matches!(
            "like".parse::<ReactionType>(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn reactions_wire_format() {
        let json = r#"[
            {"user": "a", "type": "Love", "_id": "r1"},
            {"user": "b", "type": "Haha"},
            {"user": "a", "type": "Sad"}
        ]"#;
        let r: ReactionSet = serde_json::from_str(json).unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r.reaction_of(&UserId::from("a")), Some(ReactionType::Love));
        let back = serde_json::to_value(&r).unwrap();
        assert_eq!(
            back,
            serde_json::json!([
                {"user": "a", "type": "Love"},
                {"user": "b", "type": "Haha"},
            ])
        );
    }

    #[test]
    fn engagement_apply_touches_one_side() {
        let u = UserId::from("u");
        let e = Engagement::default()
            .apply(&u, Mutation::React(ReactionType::Haha))
            .apply(&u, Mutation::Vote(VoteDirection::Down));
        assert_eq!(e.reactions.reaction_of(&u), Some(ReactionType::Haha));
        assert_eq!(e.votes.vote_of(&u), Some(VoteDirection::Down));
        assert_eq!(e.score(), -1);
    }
}

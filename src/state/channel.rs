// channel.rs - channel modes and membership
//
// chatircd - simple IRC-like chat server
// Copyright (C) 2022  Mateusz Szpakowski
//
// This library is free software; you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public
// License as published by the Free Software Foundation; either
// version 2.1 of the License, or (at your option) any later version.
//
// This library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this library; if not, write to the Free Software
// Foundation, Inc., 51 Franklin Street, Fifth Floor, Boston, MA  02110-1301  USA

use flagset::{flags, FlagSet};
use std::collections::{BTreeMap, BTreeSet};

use super::ClientId;
use crate::utils::timestamp_now;

flags! {
    pub(crate) enum ChannelMode: u8 {
        Secret,
        TopicOps,
        InviteOnly,
        NoExternal,
        KeyRequired,
    }
}

flags! {
    pub(crate) enum MemberMode: u8 {
        Owner,
        Operator,
        Invited,
        Banned,
        Voice,
    }
}

impl ChannelMode {
    pub(crate) fn from_char(c: char) -> Option<ChannelMode> {
        match c {
            's' => Some(ChannelMode::Secret),
            't' => Some(ChannelMode::TopicOps),
            'i' => Some(ChannelMode::InviteOnly),
            'n' => Some(ChannelMode::NoExternal),
            'k' => Some(ChannelMode::KeyRequired),
            _ => None,
        }
    }

    pub(crate) fn to_char(self) -> char {
        match self {
            ChannelMode::Secret => 's',
            ChannelMode::TopicOps => 't',
            ChannelMode::InviteOnly => 'i',
            ChannelMode::NoExternal => 'n',
            ChannelMode::KeyRequired => 'k',
        }
    }
}

impl MemberMode {
    pub(crate) fn from_char(c: char) -> Option<MemberMode> {
        match c {
            'o' => Some(MemberMode::Operator),
            'v' => Some(MemberMode::Voice),
            'b' => Some(MemberMode::Banned),
            _ => None,
        }
    }
}

// flags that are kept for a client that is not a member.
fn sticky_modes() -> FlagSet<MemberMode> {
    MemberMode::Banned | MemberMode::Invited
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ChannelTopic {
    pub(crate) topic: String,
    pub(crate) nick: String,
    pub(crate) set_time: i64,
}

impl ChannelTopic {
    pub(crate) fn new_with_nick(topic: String, nick: String) -> Self {
        ChannelTopic {
            topic,
            nick,
            set_time: timestamp_now(),
        }
    }
}

/// Channel with its modes, members and the retained state of non-members.
///
/// Members are keyed by client id. Non-members (banned or invited clients)
/// are kept in the shadow set keyed by nickname, so a ban outlives the
/// banned connection for as long as the channel exists.
#[derive(Clone, Debug)]
pub(crate) struct Channel {
    pub(crate) name: String,
    pub(crate) creation_time: i64,
    pub(crate) modes: FlagSet<ChannelMode>,
    pub(crate) password: Option<String>,
    pub(crate) topic: Option<ChannelTopic>,
    pub(crate) members: BTreeMap<ClientId, FlagSet<MemberMode>>,
    pub(crate) shadow: BTreeMap<String, FlagSet<MemberMode>>,
}

impl Channel {
    // creator becomes owner and operator.
    pub(crate) fn new(name: String, creator: ClientId) -> Channel {
        let mut members = BTreeMap::new();
        members.insert(creator, MemberMode::Owner | MemberMode::Operator);
        Channel {
            name,
            creation_time: timestamp_now(),
            modes: ChannelMode::TopicOps | ChannelMode::NoExternal,
            password: None,
            topic: None,
            members,
            shadow: BTreeMap::new(),
        }
    }

    pub(crate) fn set_channel_modes(
        &mut self,
        flags: impl Into<FlagSet<ChannelMode>>,
        remove: bool,
    ) {
        let flags = flags.into();
        if remove {
            self.modes -= flags;
            if flags.contains(ChannelMode::KeyRequired) {
                self.password = None;
            }
        } else {
            self.modes |= flags;
        }
    }

    pub(crate) fn check_channel_modes(&self, flags: impl Into<FlagSet<ChannelMode>>) -> bool {
        self.modes.contains(flags)
    }

    pub(crate) fn set_password(&mut self, password: String) {
        self.password = Some(password);
        self.modes |= ChannelMode::KeyRequired;
    }

    // true if key is not required or given key matches.
    pub(crate) fn check_key(&self, key: Option<&str>) -> bool {
        !self.modes.contains(ChannelMode::KeyRequired) || self.password.as_deref() == key
    }

    pub(crate) fn is_member(&self, id: ClientId) -> bool {
        self.members.contains_key(&id)
    }

    /// Set or clear member flags. Unknown clients go to the shadow set.
    pub(crate) fn set_member_modes(
        &mut self,
        id: Option<ClientId>,
        nick: &str,
        flags: impl Into<FlagSet<MemberMode>>,
        remove: bool,
    ) {
        let flags = flags.into();
        if let Some(member) = id.and_then(|id| self.members.get_mut(&id)) {
            if remove {
                *member -= flags;
            } else {
                *member |= flags;
            }
            self.ensure_operator();
        } else if remove {
            if let Some(shadow) = self.shadow.get_mut(nick) {
                *shadow -= flags;
                if shadow.is_empty() {
                    self.shadow.remove(nick);
                }
            }
        } else {
            *self.shadow.entry(nick.to_string()).or_default() |= flags;
        }
    }

    /// Check member flags, falling back to the shadow set for non-members.
    pub(crate) fn check_member_modes(
        &self,
        id: Option<ClientId>,
        nick: &str,
        flags: impl Into<FlagSet<MemberMode>>,
    ) -> bool {
        let flags = flags.into();
        if let Some(member) = id.and_then(|id| self.members.get(&id)) {
            member.contains(flags)
        } else {
            self.shadow.get(nick).is_some_and(|s| s.contains(flags))
        }
    }

    pub(crate) fn is_operator(&self, id: ClientId) -> bool {
        self.members
            .get(&id)
            .is_some_and(|m| m.contains(MemberMode::Operator))
    }

    pub(crate) fn operators(&self) -> BTreeSet<ClientId> {
        self.members
            .iter()
            .filter(|(_, m)| m.contains(MemberMode::Operator))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Move a client into the member set, taking over its shadow flags.
    pub(crate) fn add_member(&mut self, id: ClientId, nick: &str) {
        let flags = self.shadow.remove(nick).unwrap_or_default();
        *self.members.entry(id).or_default() |= flags;
    }

    /// Remove a member. A banned member stays in the shadow set. Returns
    /// true if the channel has no members left.
    pub(crate) fn remove_member(&mut self, id: ClientId, nick: &str) -> bool {
        if let Some(flags) = self.members.remove(&id) {
            let kept = flags & MemberMode::Banned;
            if !kept.is_empty() {
                *self.shadow.entry(nick.to_string()).or_default() |= kept;
            }
            self.ensure_operator();
        }
        self.members.is_empty()
    }

    // promote first member if nobody has operator left.
    fn ensure_operator(&mut self) {
        if !self
            .members
            .values()
            .any(|m| m.contains(MemberMode::Operator))
        {
            if let Some(first) = self.members.values_mut().next() {
                *first |= MemberMode::Operator;
            }
        }
    }

    // member changed nickname: merge what was kept under the new nick.
    pub(crate) fn rename_member(&mut self, id: ClientId, new_nick: &str) {
        if let Some(member) = self.members.get_mut(&id) {
            if let Some(flags) = self.shadow.remove(new_nick) {
                *member |= flags & sticky_modes();
            }
        }
    }

    // non-member changed nickname: move its kept flags to the new nick.
    pub(crate) fn rename_shadow(&mut self, old_nick: &str, new_nick: &str) {
        if old_nick == new_nick {
            return;
        }
        if let Some(flags) = self.shadow.remove(old_nick) {
            *self.shadow.entry(new_nick.to_string()).or_default() |= flags;
        }
    }

    pub(crate) fn banned_shadow_nicks(&self) -> impl Iterator<Item = &str> {
        self.shadow
            .iter()
            .filter(|(_, m)| m.contains(MemberMode::Banned))
            .map(|(n, _)| n.as_str())
    }

    /// Mode string like `+tnk key`. Key is shown only if `show_key`.
    pub(crate) fn modes_string(&self, show_key: bool) -> String {
        let mut s = '+'.to_string();
        for mode in self.modes.into_iter() {
            s.push(mode.to_char());
        }
        if show_key {
            if let Some(ref password) = self.password {
                s.push(' ');
                s += password;
            }
        }
        s
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const ALICE: ClientId = ClientId(1);
    const BOB: ClientId = ClientId(2);
    const CAROL: ClientId = ClientId(3);

    #[test]
    fn test_channel_new() {
        let channel = Channel::new("#town".to_string(), ALICE);
        assert_eq!("+tn", channel.modes_string(true));
        assert!(channel.check_channel_modes(ChannelMode::TopicOps));
        assert!(channel.check_channel_modes(ChannelMode::TopicOps | ChannelMode::NoExternal));
        assert!(!channel.check_channel_modes(ChannelMode::InviteOnly));
        assert!(channel.is_operator(ALICE));
        assert!(channel.check_member_modes(Some(ALICE), "alice", MemberMode::Owner));
        assert!(channel.shadow.is_empty());
    }

    #[test]
    fn test_channel_modes_and_key() {
        let mut channel = Channel::new("#town".to_string(), ALICE);
        channel.set_channel_modes(ChannelMode::Secret | ChannelMode::InviteOnly, false);
        channel.set_channel_modes(ChannelMode::TopicOps, true);
        assert_eq!("+sin", channel.modes_string(false));
        assert!(channel.check_key(None));
        channel.set_password("sesame".to_string());
        assert_eq!("+sink sesame", channel.modes_string(true));
        assert_eq!("+sink", channel.modes_string(false));
        assert!(!channel.check_key(None));
        assert!(!channel.check_key(Some("open")));
        assert!(channel.check_key(Some("sesame")));
        // clearing the key flag drops the password
        channel.set_channel_modes(ChannelMode::KeyRequired, true);
        assert_eq!(None, channel.password);
        assert!(channel.check_key(None));
    }

    #[test]
    fn test_channel_member_modes_shadow() {
        let mut channel = Channel::new("#town".to_string(), ALICE);
        channel.add_member(BOB, "bob");
        assert!(!channel.check_member_modes(Some(BOB), "bob", MemberMode::Voice));
        channel.set_member_modes(Some(BOB), "bob", MemberMode::Voice, false);
        assert!(channel.check_member_modes(Some(BOB), "bob", MemberMode::Voice));

        // non-members go to the shadow set
        channel.set_member_modes(None, "carol", MemberMode::Banned, false);
        assert!(channel.check_member_modes(None, "carol", MemberMode::Banned));
        assert!(channel.check_member_modes(Some(CAROL), "carol", MemberMode::Banned));
        assert!(!channel.is_member(CAROL));
        channel.set_member_modes(Some(CAROL), "carol", MemberMode::Invited, false);
        assert_eq!(
            Some(&(MemberMode::Banned | MemberMode::Invited)),
            channel.shadow.get("carol")
        );
        channel.set_member_modes(None, "carol", MemberMode::Banned | MemberMode::Invited, true);
        assert!(channel.shadow.get("carol").is_none());
    }

    #[test]
    fn test_channel_add_member_merges_shadow() {
        let mut channel = Channel::new("#town".to_string(), ALICE);
        channel.set_member_modes(None, "bob", MemberMode::Invited, false);
        channel.add_member(BOB, "bob");
        assert!(channel.shadow.is_empty());
        assert_eq!(Some(&FlagSet::from(MemberMode::Invited)), channel.members.get(&BOB));
    }

    #[test]
    fn test_channel_remove_member() {
        let mut channel = Channel::new("#town".to_string(), ALICE);
        channel.add_member(BOB, "bob");
        channel.add_member(CAROL, "carol");
        channel.set_member_modes(Some(CAROL), "carol", MemberMode::Banned, false);
        channel.set_member_modes(Some(BOB), "bob", MemberMode::Invited, false);

        // bob loses his invitation, carol keeps her ban
        assert!(!channel.remove_member(BOB, "bob"));
        assert!(channel.shadow.get("bob").is_none());
        assert!(!channel.remove_member(CAROL, "carol"));
        assert_eq!(Some(&FlagSet::from(MemberMode::Banned)), channel.shadow.get("carol"));
        assert!(channel.check_member_modes(Some(CAROL), "carol", MemberMode::Banned));
        assert_eq!(vec!["carol"], channel.banned_shadow_nicks().collect::<Vec<_>>());

        // removing a client that is not a member changes nothing
        assert!(!channel.remove_member(BOB, "bob"));
        assert!(channel.remove_member(ALICE, "alice"));
        assert!(channel.members.is_empty());
    }

    #[test]
    fn test_channel_operator_promotion() {
        let mut channel = Channel::new("#town".to_string(), ALICE);
        channel.add_member(CAROL, "carol");
        channel.add_member(BOB, "bob");
        assert!(!channel.remove_member(ALICE, "alice"));
        // first member in id order is promoted
        assert!(channel.is_operator(BOB));
        assert!(!channel.is_operator(CAROL));

        // last operator cannot leave the channel without one
        channel.set_member_modes(Some(BOB), "bob", MemberMode::Operator, true);
        assert!(channel.members.values().any(|m| m.contains(MemberMode::Operator)));
    }

    #[test]
    fn test_channel_rename_member() {
        let mut channel = Channel::new("#town".to_string(), ALICE);
        channel.add_member(BOB, "bob");
        channel.set_member_modes(None, "robert", MemberMode::Banned, false);
        channel.rename_member(BOB, "robert");
        assert!(channel.shadow.is_empty());
        assert!(channel.check_member_modes(Some(BOB), "robert", MemberMode::Banned));
        // non-members keep shadow entries as they are
        channel.set_member_modes(None, "dave", MemberMode::Invited, false);
        channel.rename_member(CAROL, "dave");
        assert!(channel.shadow.contains_key("dave"));
        channel.rename_shadow("dave", "david");
        assert!(!channel.shadow.contains_key("dave"));
        assert!(channel.check_member_modes(None, "david", MemberMode::Invited));
    }

    #[test]
    fn test_channel_operators() {
        let mut channel = Channel::new("#town".to_string(), ALICE);
        channel.add_member(BOB, "bob");
        assert_eq!(BTreeSet::from([ALICE]), channel.operators());
        // sole operator dropping its status is promoted back
        channel.set_member_modes(Some(ALICE), "alice", MemberMode::Operator, true);
        assert_eq!(BTreeSet::from([ALICE]), channel.operators());
        channel.set_member_modes(Some(BOB), "bob", MemberMode::Operator, false);
        channel.set_member_modes(Some(ALICE), "alice", MemberMode::Operator, true);
        assert_eq!(BTreeSet::from([BOB]), channel.operators());
    }
}

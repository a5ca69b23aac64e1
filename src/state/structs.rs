// structs.rs - structures of main state
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
use futures::future::{Fuse, FutureExt};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::*;

use super::channel::*;
use super::dispatch::CommandError;
use crate::command::IRCLinesCodec;
use crate::config::MainConfig;
use crate::utils::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ClientId(pub(crate) u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

flags! {
    pub(crate) enum UserMode: u8 {
        Away,
        Invisible,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum RegState {
    AwaitingPassword,
    AwaitingRegistration,
    Registered,
    Closing,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum TimerKind {
    Ping,
    PongTimeout,
}

#[derive(Debug)]
pub(crate) struct Client {
    pub(crate) id: ClientId,
    pub(crate) hostname: String,
    pub(crate) sender: UnboundedSender<String>,
    // used to close connection from other task (SHUTDOWN).
    pub(crate) quit_sender: Option<oneshot::Sender<String>>,
    pub(crate) state: RegState,
    pub(crate) password_verified: bool,
    pub(crate) nick: Option<String>,
    pub(crate) username: Option<String>,
    pub(crate) realname: Option<String>,
    pub(crate) modes: FlagSet<UserMode>,
    pub(crate) away: Option<String>,
    // names of joined channels
    pub(crate) channels: BTreeSet<String>,
    pub(crate) signon: i64,
    pub(crate) last_activity: Instant,
    pub(crate) ping_sent: Option<Instant>,
    pub(crate) quit_reason: Option<String>,
}

impl Client {
    pub(crate) fn new(
        id: ClientId,
        hostname: String,
        sender: UnboundedSender<String>,
        quit_sender: oneshot::Sender<String>,
        password_required: bool,
    ) -> Client {
        Client {
            id,
            hostname,
            sender,
            quit_sender: Some(quit_sender),
            state: if password_required {
                RegState::AwaitingPassword
            } else {
                RegState::AwaitingRegistration
            },
            password_verified: !password_required,
            nick: None,
            username: None,
            realname: None,
            modes: FlagSet::default(),
            away: None,
            channels: BTreeSet::new(),
            signon: timestamp_now(),
            last_activity: Instant::now(),
            ping_sent: None,
            quit_reason: None,
        }
    }

    pub(crate) fn has_nick(&self) -> bool {
        self.nick.is_some()
    }

    pub(crate) fn has_user(&self) -> bool {
        self.username.is_some()
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.state == RegState::Registered
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.state == RegState::Closing
    }

    pub(crate) fn is_invisible(&self) -> bool {
        self.modes.contains(UserMode::Invisible)
    }

    pub(crate) fn is_away(&self) -> bool {
        self.modes.contains(UserMode::Away)
    }

    // nick or '*' if not set.
    pub(crate) fn client_name(&self) -> &str {
        self.nick.as_deref().unwrap_or("*")
    }

    pub(crate) fn source(&self) -> String {
        format!(
            "{}!{}@{}",
            self.client_name(),
            self.username.as_deref().unwrap_or("*"),
            self.hostname
        )
    }

    pub(crate) fn modes_string(&self) -> String {
        let mut s = '+'.to_string();
        if self.is_away() {
            s.push('a');
        }
        if self.is_invisible() {
            s.push('i');
        }
        s
    }

    pub(crate) fn send_line(&self, line: String) {
        if self.sender.send(line).is_err() {
            debug!("Client {} gone while sending", self.id);
        }
    }

    pub(crate) fn send_msg_display<T: fmt::Display>(&self, source: &str, t: T) {
        self.send_line(format!(":{} {}", source, t));
    }

    pub(crate) fn close(&mut self, reason: &str) {
        self.state = RegState::Closing;
        if self.quit_reason.is_none() {
            self.quit_reason = Some(reason.to_string());
        }
    }

    // wake up connection task of this client to close the connection.
    pub(crate) fn force_close(&mut self, reason: &str) {
        self.close(reason);
        if let Some(quit_sender) = self.quit_sender.take() {
            if quit_sender.send(reason.to_string()).is_err() {
                debug!("Client {} already gone", self.id);
            }
        }
    }

    // next liveness timer: ping an idle registered client or wait for pong.
    pub(crate) fn next_timer(&self, config: &MainConfig) -> Option<(Instant, TimerKind)> {
        if let Some(ping_sent) = self.ping_sent {
            Some((
                ping_sent + Duration::from_secs(config.pong_timeout),
                TimerKind::PongTimeout,
            ))
        } else if self.is_registered() {
            Some((
                self.last_activity + Duration::from_secs(config.ping_timeout),
                TimerKind::Ping,
            ))
        } else {
            None
        }
    }
}

/// Per-connection part held by the connection task.
pub(crate) struct ConnState {
    pub(crate) id: ClientId,
    pub(crate) stream: Framed<TcpStream, IRCLinesCodec>,
    pub(crate) receiver: UnboundedReceiver<String>,
    // quit receiver - receive close request from other task.
    pub(crate) quit_receiver: Fuse<oneshot::Receiver<String>>,
    pub(crate) timer: Option<(Instant, TimerKind)>,
    pub(crate) quit: bool,
    conns_count: Arc<AtomicUsize>,
}

impl ConnState {
    pub(crate) fn new(
        id: ClientId,
        stream: Framed<TcpStream, IRCLinesCodec>,
        receiver: UnboundedReceiver<String>,
        quit_receiver: oneshot::Receiver<String>,
        conns_count: Arc<AtomicUsize>,
    ) -> ConnState {
        ConnState {
            id,
            stream,
            receiver,
            quit_receiver: quit_receiver.fuse(),
            timer: None,
            quit: false,
            conns_count,
        }
    }

    pub(crate) fn is_quit(&self) -> bool {
        self.quit
    }
}

impl Drop for ConnState {
    fn drop(&mut self) {
        self.conns_count.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum JoinOutcome {
    Joined { created: bool },
    AlreadyMember,
}

pub(crate) struct VolatileState {
    pub(crate) clients: HashMap<ClientId, Client>,
    // nickname to client
    pub(crate) nicks: HashMap<String, ClientId>,
    pub(crate) channels: BTreeMap<String, Channel>,
    pub(crate) quit_sender: Option<oneshot::Sender<String>>,
    next_client_id: u64,
}

impl VolatileState {
    pub(crate) fn new() -> VolatileState {
        VolatileState {
            clients: HashMap::new(),
            nicks: HashMap::new(),
            channels: BTreeMap::new(),
            quit_sender: None,
            next_client_id: 1,
        }
    }

    pub(crate) fn add_client(
        &mut self,
        hostname: String,
        sender: UnboundedSender<String>,
        quit_sender: oneshot::Sender<String>,
        password_required: bool,
    ) -> ClientId {
        let id = ClientId(self.next_client_id);
        self.next_client_id += 1;
        self.clients.insert(
            id,
            Client::new(id, hostname, sender, quit_sender, password_required),
        );
        id
    }

    pub(crate) fn find_nick(&self, nick: &str) -> Option<ClientId> {
        self.nicks.get(nick).copied()
    }

    pub(crate) fn client_by_nick(&self, nick: &str) -> Option<&Client> {
        self.find_nick(nick).and_then(|id| self.clients.get(&id))
    }

    pub(crate) fn nick_of(&self, id: ClientId) -> &str {
        self.clients.get(&id).map_or("*", |c| c.client_name())
    }

    /// Set new nickname. Returns old nickname.
    pub(crate) fn set_nick(&mut self, id: ClientId, nick: &str) -> Option<String> {
        let Some(client) = self.clients.get_mut(&id) else {
            return None;
        };
        let old_nick = client.nick.replace(nick.to_string());
        if let Some(ref old_nick) = old_nick {
            self.nicks.remove(old_nick);
        }
        self.nicks.insert(nick.to_string(), id);
        for chname in &client.channels {
            if let Some(channel) = self.channels.get_mut(chname) {
                channel.rename_member(id, nick);
            }
        }
        // bans and invites of channels left earlier follow the client
        if let Some(ref old_nick) = old_nick {
            for channel in self.channels.values_mut() {
                channel.rename_shadow(old_nick, nick);
            }
        }
        old_nick
    }

    /// Join protocol for single channel.
    pub(crate) fn join_channel(
        &mut self,
        id: ClientId,
        name: &str,
        key: Option<&str>,
    ) -> Result<JoinOutcome, CommandError> {
        if !is_channel(name) {
            return Err(CommandError::BadChannelMask(name.to_string()));
        }
        if validate_channel(name).is_err() {
            return Err(CommandError::NoSuchChannel(name.to_string()));
        }
        let Some(client) = self.clients.get_mut(&id) else {
            return Err(CommandError::NotRegistered);
        };
        let nick = client.client_name().to_string();

        let created = match self.channels.get_mut(name) {
            Some(channel) => {
                if channel.is_member(id) {
                    return Ok(JoinOutcome::AlreadyMember);
                }
                if channel.check_channel_modes(ChannelMode::InviteOnly)
                    && !channel.check_member_modes(Some(id), &nick, MemberMode::Invited)
                {
                    return Err(CommandError::InviteOnlyChannel(name.to_string()));
                }
                if channel.check_member_modes(Some(id), &nick, MemberMode::Banned) {
                    return Err(CommandError::BannedFromChannel(name.to_string()));
                }
                if !channel.check_key(key) {
                    return Err(CommandError::BadChannelKey(name.to_string()));
                }
                channel.add_member(id, &nick);
                false
            }
            None => {
                info!("Channel {} created by {}", name, nick);
                self.channels
                    .insert(name.to_string(), Channel::new(name.to_string(), id));
                true
            }
        };
        client.channels.insert(name.to_string());
        Ok(JoinOutcome::Joined { created })
    }

    /// Leave protocol. Channel is removed when its last member leaves.
    pub(crate) fn leave_channel(&mut self, id: ClientId, name: &str) {
        let nick = self.nick_of(id).to_string();
        if let Some(client) = self.clients.get_mut(&id) {
            client.channels.remove(name);
        }
        if let Some(channel) = self.channels.get_mut(name) {
            if channel.remove_member(id, &nick) {
                info!("Channel {} removed", name);
                self.channels.remove(name);
            }
        }
    }

    // clients sharing any channel with given client.
    pub(crate) fn channel_peers(&self, id: ClientId) -> BTreeSet<ClientId> {
        let mut peers = BTreeSet::new();
        if let Some(client) = self.clients.get(&id) {
            for chname in &client.channels {
                if let Some(channel) = self.channels.get(chname) {
                    peers.extend(channel.members.keys().copied());
                }
            }
        }
        peers.remove(&id);
        peers
    }

    /// Remove client: QUIT to its peers, leave every channel, drop the client.
    pub(crate) fn remove_client(&mut self, id: ClientId) -> Option<Client> {
        let (source, reason, channels) = {
            let client = self.clients.get(&id)?;
            (
                client.source(),
                client
                    .quit_reason
                    .clone()
                    .unwrap_or_else(|| "Connection closed".to_string()),
                client.channels.clone(),
            )
        };
        for peer in self.channel_peers(id) {
            if let Some(peer) = self.clients.get(&peer) {
                peer.send_msg_display(&source, format!("QUIT :{}", reason));
            }
        }
        for chname in &channels {
            self.leave_channel(id, chname);
        }
        let client = self.clients.remove(&id)?;
        if let Some(ref nick) = client.nick {
            self.nicks.remove(nick);
        }
        Some(client)
    }

    /// Send message to members of the channel, optionally skipping one.
    pub(crate) fn send_to_channel<T: fmt::Display>(
        &self,
        chname: &str,
        source: &str,
        t: T,
        except: Option<ClientId>,
    ) {
        let Some(channel) = self.channels.get(chname) else {
            return;
        };
        let line = format!(":{} {}", source, t);
        for id in channel.members.keys() {
            if Some(*id) != except {
                if let Some(client) = self.clients.get(id) {
                    client.send_line(line.clone());
                }
            }
        }
    }

    // channel is visible if not secret or viewer is member.
    pub(crate) fn can_see_channel(&self, channel: &Channel, viewer: ClientId) -> bool {
        !channel.check_channel_modes(ChannelMode::Secret) || channel.is_member(viewer)
    }

    /// Nicknames for NAMES reply. Operators get '@', voiced members '+'.
    /// Owner alone gives no prefix.
    /// Invisible members are hidden from non-members.
    pub(crate) fn channel_names(&self, channel: &Channel, viewer: ClientId) -> Vec<String> {
        let viewer_is_member = channel.is_member(viewer);
        channel
            .members
            .iter()
            .filter_map(|(id, modes)| {
                let client = self.clients.get(id)?;
                if !viewer_is_member && client.is_invisible() {
                    return None;
                }
                let prefix = if modes.contains(MemberMode::Operator) {
                    "@"
                } else if modes.contains(MemberMode::Voice) {
                    "+"
                } else {
                    ""
                };
                Some(format!("{}{}", prefix, client.client_name()))
            })
            .collect()
    }

    // ban masks of banned members and shadow entries. A nick without
    // a connected client is shown as nick!*@*.
    pub(crate) fn channel_bans(&self, channel: &Channel) -> Vec<String> {
        let mut bans = channel
            .members
            .iter()
            .filter(|(_, m)| m.contains(MemberMode::Banned))
            .filter_map(|(id, _)| self.clients.get(id).map(|c| c.source()))
            .collect::<Vec<_>>();
        bans.extend(channel.banned_shadow_nicks().map(|nick| {
            self.client_by_nick(nick)
                .map_or_else(|| format!("{}!*@*", nick), |c| c.source())
        }));
        bans
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    fn add_test_client(
        state: &mut VolatileState,
        nick: &str,
    ) -> (ClientId, UnboundedReceiver<String>) {
        let (sender, receiver) = unbounded_channel();
        let (quit_sender, _) = oneshot::channel();
        let id = state.add_client("127.0.0.1".to_string(), sender, quit_sender, false);
        state.set_nick(id, nick);
        let client = state.clients.get_mut(&id).unwrap();
        client.username = Some(nick[..2].to_string());
        client.state = RegState::Registered;
        (id, receiver)
    }

    fn drain(receiver: &mut UnboundedReceiver<String>) -> Vec<String> {
        let mut out = vec![];
        while let Ok(line) = receiver.try_recv() {
            out.push(line);
        }
        out
    }

    #[test]
    fn test_client_new() {
        let (sender, _receiver) = unbounded_channel();
        let (quit_sender, _) = oneshot::channel();
        let client = Client::new(ClientId(1), "10.0.0.1".to_string(), sender, quit_sender, true);
        assert_eq!(RegState::AwaitingPassword, client.state);
        assert!(!client.password_verified);
        assert!(!client.has_nick());
        assert!(!client.has_user());
        assert_eq!("*", client.client_name());
        assert_eq!("*!*@10.0.0.1", client.source());
        assert_eq!("+", client.modes_string());
        assert_eq!(None, client.next_timer(&MainConfig::default()));

        let (sender, _receiver) = unbounded_channel();
        let (quit_sender, _) = oneshot::channel();
        let client = Client::new(ClientId(2), "10.0.0.1".to_string(), sender, quit_sender, false);
        assert_eq!(RegState::AwaitingRegistration, client.state);
        assert!(client.password_verified);
    }

    #[test]
    fn test_client_next_timer() {
        let config = MainConfig::default();
        let (sender, _receiver) = unbounded_channel();
        let (quit_sender, _) = oneshot::channel();
        let mut client = Client::new(ClientId(1), "h".to_string(), sender, quit_sender, false);
        client.state = RegState::Registered;
        let (when, kind) = client.next_timer(&config).unwrap();
        assert_eq!(TimerKind::Ping, kind);
        assert_eq!(client.last_activity + Duration::from_secs(120), when);
        let now = Instant::now();
        client.ping_sent = Some(now);
        assert_eq!(
            Some((now + Duration::from_secs(20), TimerKind::PongTimeout)),
            client.next_timer(&config)
        );
    }

    #[test]
    fn test_volatile_state_nicks() {
        let mut state = VolatileState::new();
        let (alice, _ra) = add_test_client(&mut state, "alice");
        assert_eq!(Some(alice), state.find_nick("alice"));
        assert_eq!(Some("alice".to_string()), state.set_nick(alice, "alicia"));
        assert_eq!(None, state.find_nick("alice"));
        assert_eq!(Some(alice), state.find_nick("alicia"));
        assert_eq!("alicia", state.nick_of(alice));
        assert_eq!("*", state.nick_of(ClientId(999)));
    }

    #[test]
    fn test_volatile_state_join_leave() {
        let mut state = VolatileState::new();
        let (alice, _ra) = add_test_client(&mut state, "alice");
        let (bob, _rb) = add_test_client(&mut state, "bob");

        assert_eq!(
            Err(CommandError::BadChannelMask("town".to_string())),
            state.join_channel(alice, "town", None)
        );
        assert_eq!(
            Err(CommandError::NoSuchChannel("#to\x07wn".to_string())),
            state.join_channel(alice, "#to\x07wn", None)
        );
        assert_eq!(
            Ok(JoinOutcome::Joined { created: true }),
            state.join_channel(alice, "#town", None)
        );
        assert_eq!(
            Ok(JoinOutcome::AlreadyMember),
            state.join_channel(alice, "#town", None)
        );
        assert_eq!(
            Ok(JoinOutcome::Joined { created: false }),
            state.join_channel(bob, "#town", None)
        );
        let channel = state.channels.get("#town").unwrap();
        assert_eq!(
            vec!["@alice".to_string(), "bob".to_string()],
            state.channel_names(channel, alice)
        );
        assert!(state.clients[&bob].channels.contains("#town"));

        state.leave_channel(alice, "#town");
        let channel = state.channels.get("#town").unwrap();
        assert_eq!(vec!["@bob".to_string()], state.channel_names(channel, bob));
        assert!(state.clients[&alice].channels.is_empty());

        state.leave_channel(bob, "#town");
        assert!(state.channels.get("#town").is_none());
    }

    #[test]
    fn test_volatile_state_join_restrictions() {
        let mut state = VolatileState::new();
        let (alice, _ra) = add_test_client(&mut state, "alice");
        let (bob, _rb) = add_test_client(&mut state, "bob");
        state.join_channel(alice, "#town", None).unwrap();
        {
            let channel = state.channels.get_mut("#town").unwrap();
            channel.set_channel_modes(ChannelMode::InviteOnly, false);
        }
        assert_eq!(
            Err(CommandError::InviteOnlyChannel("#town".to_string())),
            state.join_channel(bob, "#town", None)
        );
        {
            let channel = state.channels.get_mut("#town").unwrap();
            channel.set_member_modes(Some(bob), "bob", MemberMode::Invited, false);
            channel.set_password("key".to_string());
        }
        assert_eq!(
            Err(CommandError::BadChannelKey("#town".to_string())),
            state.join_channel(bob, "#town", Some("nokey"))
        );
        assert_eq!(
            Ok(JoinOutcome::Joined { created: false }),
            state.join_channel(bob, "#town", Some("key"))
        );

        // ban survives leaving the channel
        {
            let channel = state.channels.get_mut("#town").unwrap();
            channel.set_member_modes(Some(bob), "bob", MemberMode::Banned, false);
            channel.set_channel_modes(ChannelMode::InviteOnly | ChannelMode::KeyRequired, true);
        }
        state.leave_channel(bob, "#town");
        assert_eq!(
            Err(CommandError::BannedFromChannel("#town".to_string())),
            state.join_channel(bob, "#town", None)
        );
        let channel = state.channels.get("#town").unwrap();
        assert_eq!(vec!["bob!bo@127.0.0.1".to_string()], state.channel_bans(channel));
    }

    #[test]
    fn test_volatile_state_ban_follows_nick() {
        let mut state = VolatileState::new();
        let (alice, _ra) = add_test_client(&mut state, "alice");
        let (bob, _rb) = add_test_client(&mut state, "bob");
        state.join_channel(alice, "#town", None).unwrap();
        state.join_channel(bob, "#town", None).unwrap();
        state
            .channels
            .get_mut("#town")
            .unwrap()
            .set_member_modes(Some(bob), "bob", MemberMode::Banned, false);
        state.leave_channel(bob, "#town");

        state.set_nick(bob, "bobby");
        assert_eq!(
            Err(CommandError::BannedFromChannel("#town".to_string())),
            state.join_channel(bob, "#town", None)
        );
        let channel = state.channels.get("#town").unwrap();
        assert!(channel.shadow.get("bob").is_none());
        assert_eq!(vec!["bobby!bo@127.0.0.1".to_string()], state.channel_bans(channel));
        // old nick is free for somebody else
        let (carol, _rc) = add_test_client(&mut state, "bob");
        assert!(state.join_channel(carol, "#town", None).is_ok());
    }

    #[test]
    fn test_volatile_state_deop_names() {
        let mut state = VolatileState::new();
        let (alice, _ra) = add_test_client(&mut state, "alice");
        let (bob, _rb) = add_test_client(&mut state, "bob");
        state.join_channel(alice, "#town", None).unwrap();
        state.join_channel(bob, "#town", None).unwrap();
        let channel = state.channels.get_mut("#town").unwrap();
        channel.set_member_modes(Some(bob), "bob", MemberMode::Operator, false);
        channel.set_member_modes(Some(alice), "alice", MemberMode::Operator, true);
        let channel = state.channels.get("#town").unwrap();
        assert!(!channel.is_operator(alice));
        assert_eq!(
            vec!["alice".to_string(), "@bob".to_string()],
            state.channel_names(channel, alice)
        );
    }

    #[test]
    fn test_volatile_state_remove_client() {
        let mut state = VolatileState::new();
        let (alice, mut ra) = add_test_client(&mut state, "alice");
        let (bob, mut rb) = add_test_client(&mut state, "bob");
        let (carol, mut rc) = add_test_client(&mut state, "carol");
        state.join_channel(alice, "#town", None).unwrap();
        state.join_channel(bob, "#town", None).unwrap();
        state.join_channel(alice, "#city", None).unwrap();
        state.join_channel(bob, "#city", None).unwrap();
        state.join_channel(alice, "#alone", None).unwrap();
        state.clients.get_mut(&alice).unwrap().quit_reason = Some("Bye".to_string());

        let removed = state.remove_client(alice).unwrap();
        assert_eq!(alice, removed.id);
        assert!(state.find_nick("alice").is_none());
        assert!(state.channels.get("#alone").is_none());
        // one QUIT per peer even with two shared channels
        assert_eq!(vec![":alice!al@127.0.0.1 QUIT :Bye".to_string()], drain(&mut rb));
        assert!(drain(&mut rc).is_empty());
        assert!(drain(&mut ra).is_empty());
        let channel = state.channels.get("#town").unwrap();
        assert!(channel.is_operator(bob));
        assert!(state.remove_client(alice).is_none());
        assert!(state.remove_client(carol).is_some());
    }

    #[test]
    fn test_volatile_state_invisible_names() {
        let mut state = VolatileState::new();
        let (alice, _ra) = add_test_client(&mut state, "alice");
        let (bob, _rb) = add_test_client(&mut state, "bob");
        let (carol, _rc) = add_test_client(&mut state, "carol");
        state.join_channel(alice, "#town", None).unwrap();
        state.join_channel(bob, "#town", None).unwrap();
        state.clients.get_mut(&bob).unwrap().modes |= UserMode::Invisible;
        let channel = state.channels.get("#town").unwrap();
        assert_eq!(
            vec!["@alice".to_string(), "bob".to_string()],
            state.channel_names(channel, alice)
        );
        assert_eq!(vec!["@alice".to_string()], state.channel_names(channel, carol));
        assert!(state.can_see_channel(channel, carol));
        let channel = state.channels.get_mut("#town").unwrap();
        channel.set_channel_modes(ChannelMode::Secret, false);
        let channel = state.channels.get("#town").unwrap();
        assert!(!state.can_see_channel(channel, carol));
        assert!(state.can_see_channel(channel, bob));
    }

    #[test]
    fn test_volatile_state_send_to_channel() {
        let mut state = VolatileState::new();
        let (alice, mut ra) = add_test_client(&mut state, "alice");
        let (bob, mut rb) = add_test_client(&mut state, "bob");
        state.join_channel(alice, "#town", None).unwrap();
        state.join_channel(bob, "#town", None).unwrap();
        state.send_to_channel("#town", "alice!al@h", "PRIVMSG #town :hi", Some(alice));
        assert!(drain(&mut ra).is_empty());
        assert_eq!(vec![":alice!al@h PRIVMSG #town :hi".to_string()], drain(&mut rb));
        state.send_to_channel("#town", "irc.irc", "NOTICE #town :all", None);
        assert_eq!(1, drain(&mut ra).len());
        assert_eq!(1, drain(&mut rb).len());
    }
}

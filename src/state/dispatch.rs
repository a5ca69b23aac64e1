// dispatch.rs - command table and dispatching
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

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tracing::*;

use super::channel_cmds::*;
use super::conn_cmds::*;
use super::rest_cmds::*;
use super::{Client, ClientId, RegState, VolatileState};
use crate::command::Message;
use crate::config::MainConfig;
use crate::reply::Reply::{self, *};

/// Errors reported to the issuing client as numeric replies.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub(crate) enum CommandError {
    #[error("not enough parameters for {0}")]
    NeedMoreParams(String),
    #[error("bad channel mask {0}")]
    BadChannelMask(String),
    #[error("no such channel {0}")]
    NoSuchChannel(String),
    #[error("no such nick {0}")]
    NoSuchNick(String),
    #[error("channel {0} is invite only")]
    InviteOnlyChannel(String),
    #[error("banned from channel {0}")]
    BannedFromChannel(String),
    #[error("bad key for channel {0}")]
    BadChannelKey(String),
    #[error("cannot send to channel {0}")]
    CannotSendToChannel(String),
    #[error("no recipient given for {0}")]
    NoRecipient(String),
    #[error("no text to send")]
    NoTextToSend,
    #[error("unknown command {0}")]
    UnknownCommand(String),
    #[error("not registered")]
    NotRegistered,
    #[error("no nickname given")]
    NoNicknameGiven,
    #[error("erroneous nickname {0}")]
    ErroneousNickname(String),
    #[error("nickname {0} in use")]
    NicknameInUse(String),
    #[error("not on channel {0}")]
    NotOnChannel(String),
    #[error("user {0} not in channel {1}")]
    UserNotInChannel(String, String),
    #[error("user {0} already on channel {1}")]
    UserOnChannel(String, String),
    #[error("channel operator privileges needed for {0}")]
    ChanOpPrivsNeeded(String),
    #[error("unknown mode {0} for {1}")]
    UnknownMode(char, String),
    #[error("unknown user mode flag")]
    UmodeUnknownFlag,
    #[error("can't change mode for other users")]
    UsersDontMatch,
    #[error("no origin specified")]
    NoOrigin,
    #[error("already registered")]
    AlreadyRegistered,
}

use CommandError::*;

impl CommandError {
    pub(crate) fn to_reply<'a>(&'a self, client: &'a str) -> Reply<'a> {
        match self {
            NeedMoreParams(command) => ErrNeedMoreParams461 { client, command },
            BadChannelMask(channel) => ErrBadChanMask476 { channel },
            NoSuchChannel(channel) => ErrNoSuchChannel403 { client, channel },
            NoSuchNick(nick) => ErrNoSuchNick401 { client, nick },
            InviteOnlyChannel(channel) => ErrInviteOnlyChan473 { client, channel },
            BannedFromChannel(channel) => ErrBannedFromChan474 { client, channel },
            BadChannelKey(channel) => ErrBadChannelKey475 { client, channel },
            CannotSendToChannel(channel) => ErrCannotSendToChain404 { client, channel },
            NoRecipient(command) => ErrNoRecipient411 { client, command },
            NoTextToSend => ErrNoTextToSend412 { client },
            UnknownCommand(command) => ErrUnknownCommand421 { client, command },
            NotRegistered => ErrNotRegistered451 { client },
            NoNicknameGiven => ErrNoNicknameGiven431 { client },
            ErroneousNickname(nick) => ErrErroneusNickname432 { client, nick },
            NicknameInUse(nick) => ErrNicknameInUse433 { client, nick },
            NotOnChannel(channel) => ErrNotOnChannel442 { client, channel },
            UserNotInChannel(nick, channel) => ErrUserNotInChannel441 {
                client,
                nick,
                channel,
            },
            UserOnChannel(nick, channel) => ErrUserOnChannel443 {
                client,
                nick,
                channel,
            },
            ChanOpPrivsNeeded(channel) => ErrChanOpPrivsNeeded482 { client, channel },
            UnknownMode(modechar, channel) => ErrUnknownMode472 {
                client,
                modechar: *modechar,
                channel,
            },
            UmodeUnknownFlag => ErrUmodeUnknownFlag501 { client },
            UsersDontMatch => ErrUsersDontMatch502 { client },
            NoOrigin => ErrNoOrigin409 { client },
            AlreadyRegistered => ErrAlreadyRegistered462 { client },
        }
    }
}

/// Everything a command sees while it runs. The state is locked for the
/// whole call, so a command is atomic against other connections.
pub(crate) struct Context<'a> {
    pub(crate) state: &'a mut VolatileState,
    pub(crate) config: &'a MainConfig,
    pub(crate) created: &'a str,
    pub(crate) client: ClientId,
}

impl Context<'_> {
    // issuing client stays in the state until its connection task ends.
    pub(crate) fn me(&self) -> &Client {
        &self.state.clients[&self.client]
    }

    pub(crate) fn me_mut(&mut self) -> Option<&mut Client> {
        self.state.clients.get_mut(&self.client)
    }

    pub(crate) fn client_name(&self) -> String {
        self.me().client_name().to_string()
    }

    // send numeric or other server reply to the issuing client.
    pub(crate) fn reply<T: fmt::Display>(&self, t: T) {
        self.me().send_msg_display(&self.config.name, t);
    }

    pub(crate) fn error(&self, e: CommandError) {
        let client = self.client_name();
        self.reply(e.to_reply(&client));
    }

    // send raw line (without source) to the issuing client.
    pub(crate) fn send_line(&self, line: String) {
        self.me().send_line(line);
    }

    pub(crate) fn source(&self) -> String {
        self.me().source()
    }
}

/// Command handler. `validate` only looks at the state; `execute` runs
/// after a successful validation and does the work.
pub(crate) trait Command: Send + Sync {
    fn validate(&self, ctx: &Context<'_>, msg: &Message<'_>) -> Result<(), CommandError>;
    fn execute(&self, ctx: &mut Context<'_>, msg: &Message<'_>);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Gate {
    Pass,
    Ignore,
    NotRegistered,
    BadPassword,
}

fn gate(state: RegState, command: &str) -> Gate {
    match state {
        RegState::Registered => Gate::Pass,
        RegState::Closing => Gate::Ignore,
        RegState::AwaitingPassword => match command {
            "pass" | "cap" => Gate::Pass,
            _ => Gate::BadPassword,
        },
        RegState::AwaitingRegistration => match command {
            "pass" | "nick" | "user" | "cap" => Gate::Pass,
            _ => Gate::NotRegistered,
        },
    }
}

// reply with password mismatch and close the connection.
pub(crate) fn close_bad_password(ctx: &mut Context<'_>) {
    let client = ctx.client_name();
    ctx.reply(ErrPasswdMismatch464 { client: &client });
    let host = ctx.me().hostname.clone();
    ctx.send_line(format!("ERROR :Closing Link: {} (Bad Password)", host));
    if let Some(me) = ctx.me_mut() {
        me.close("Bad Password");
    }
    info!("Bad password from {}", host);
}

pub(crate) struct CommandRegistry {
    commands: HashMap<&'static str, Box<dyn Command>>,
}

impl CommandRegistry {
    pub(crate) fn new() -> CommandRegistry {
        let mut commands: HashMap<&'static str, Box<dyn Command>> = HashMap::new();
        commands.insert("cap", Box::new(CapCommand));
        commands.insert("pass", Box::new(PassCommand));
        commands.insert("nick", Box::new(NickCommand));
        commands.insert("user", Box::new(UserCommand));
        commands.insert("ping", Box::new(PingCommand));
        commands.insert("pong", Box::new(PongCommand));
        commands.insert("quit", Box::new(QuitCommand));
        commands.insert("away", Box::new(AwayCommand));
        commands.insert("shutdown", Box::new(ShutdownCommand));
        commands.insert("join", Box::new(JoinCommand));
        commands.insert("part", Box::new(PartCommand));
        commands.insert("topic", Box::new(TopicCommand));
        commands.insert("names", Box::new(NamesCommand));
        commands.insert("list", Box::new(ListCommand));
        commands.insert("invite", Box::new(InviteCommand));
        commands.insert("kick", Box::new(KickCommand));
        commands.insert("mode", Box::new(ModeCommand));
        commands.insert("privmsg", Box::new(PrivMsgCommand));
        commands.insert("notice", Box::new(NoticeCommand));
        commands.insert("who", Box::new(WhoCommand));
        commands.insert("whois", Box::new(WhoIsCommand));
        CommandRegistry { commands }
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(|c| c.as_ref())
    }

    /// Run one message through the registration gate and its handler.
    pub(crate) fn dispatch(&self, ctx: &mut Context<'_>, msg: &Message<'_>) {
        let Some(reg_state) = ctx.state.clients.get(&ctx.client).map(|c| c.state) else {
            return;
        };
        match gate(reg_state, &msg.command) {
            Gate::Pass => {}
            Gate::Ignore => return,
            Gate::NotRegistered => {
                ctx.error(NotRegistered);
                return;
            }
            Gate::BadPassword => {
                close_bad_password(ctx);
                return;
            }
        }

        let Some(command) = self.resolve(&msg.command) else {
            ctx.error(UnknownCommand(msg.name()));
            return;
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(), CommandError> {
            command.validate(ctx, msg)?;
            command.execute(ctx, msg);
            Ok(())
        }));
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("Command {} rejected: {}", msg.name(), e);
                ctx.error(e);
            }
            Err(_) => error!("Command {} from client {} panicked", msg.name(), ctx.client),
        }
    }
}

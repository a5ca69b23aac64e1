// conn_cmds.rs - connection commands
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

use tracing::*;

use super::dispatch::{close_bad_password, Command, CommandError, Context};
use super::{RegState, UserMode};
use crate::command::Message;
use crate::reply::Reply::*;
use crate::utils::*;

pub(crate) const SERVER_VERSION: &str =
    concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"));
const AVAIL_USER_MODES: &str = "ai";
const AVAIL_CHANNEL_MODES: &str = "biknostv";

// complete registration if nick and user are set.
fn try_register(ctx: &mut Context<'_>) {
    let me = ctx.me();
    if me.state != RegState::AwaitingRegistration
        || !me.password_verified
        || !me.has_nick()
        || !me.has_user()
    {
        return;
    }
    if let Some(me) = ctx.me_mut() {
        me.state = RegState::Registered;
    }
    info!("Client {} registered as {}", ctx.client, ctx.me().source());
    send_welcome(ctx);
}

fn send_welcome(ctx: &Context<'_>) {
    let me = ctx.me();
    let client = me.client_name();
    let user = me.username.as_deref().unwrap_or("*");
    let config = ctx.config;
    ctx.reply(RplWelcome001 {
        client,
        networkname: &config.network,
        nick: client,
        user,
        host: &me.hostname,
    });
    ctx.reply(RplYourHost002 {
        client,
        servername: &config.name,
        version: SERVER_VERSION,
    });
    ctx.reply(RplCreated003 {
        client,
        datetime: ctx.created,
    });
    ctx.reply(RplMyInfo004 {
        client,
        servername: &config.name,
        version: SERVER_VERSION,
        avail_user_modes: AVAIL_USER_MODES,
        avail_chmodes: AVAIL_CHANNEL_MODES,
    });
    match config.motd.as_deref() {
        Some(motd) => {
            ctx.reply(RplMotdStart375 {
                client,
                server: &config.name,
            });
            for line in motd.lines() {
                ctx.reply(RplMotd372 { client, motd: line });
            }
            ctx.reply(RplEndOfMotd376 { client });
        }
        None => ctx.reply(ErrNoMotd422 { client }),
    }
}

pub(crate) struct CapCommand;

impl Command for CapCommand {
    fn validate(&self, _: &Context<'_>, _: &Message<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn execute(&self, ctx: &mut Context<'_>, msg: &Message<'_>) {
        let client = ctx.client_name();
        match msg.arg(0).map(|s| s.to_ascii_uppercase()).as_deref() {
            Some("LS") => ctx.reply(format!("CAP {} LS :", client)),
            Some("LIST") => ctx.reply(format!("CAP {} LIST :", client)),
            Some("REQ") => ctx.reply(format!(
                "CAP {} NAK :{}",
                client,
                msg.arg(1).unwrap_or_default()
            )),
            _ => {}
        }
    }
}

pub(crate) struct PassCommand;

impl Command for PassCommand {
    fn validate(&self, ctx: &Context<'_>, msg: &Message<'_>) -> Result<(), CommandError> {
        if ctx.me().is_registered() {
            return Err(CommandError::AlreadyRegistered);
        }
        msg.nonempty_arg(0)
            .map(|_| ())
            .ok_or_else(|| CommandError::NeedMoreParams(msg.name()))
    }

    fn execute(&self, ctx: &mut Context<'_>, msg: &Message<'_>) {
        let password = msg.arg(0).unwrap_or_default();
        let good = ctx
            .config
            .password
            .as_deref()
            .is_none_or(|p| p == password);
        if !good {
            close_bad_password(ctx);
            return;
        }
        if let Some(me) = ctx.me_mut() {
            me.password_verified = true;
            if me.state == RegState::AwaitingPassword {
                me.state = RegState::AwaitingRegistration;
            }
        }
    }
}

pub(crate) struct NickCommand;

impl Command for NickCommand {
    fn validate(&self, ctx: &Context<'_>, msg: &Message<'_>) -> Result<(), CommandError> {
        let nick = msg.nonempty_arg(0).ok_or(CommandError::NoNicknameGiven)?;
        if validate_nickname(nick).is_err() {
            return Err(CommandError::ErroneousNickname(nick.to_string()));
        }
        match ctx.state.find_nick(nick) {
            Some(id) if id != ctx.client => Err(CommandError::NicknameInUse(nick.to_string())),
            _ => Ok(()),
        }
    }

    fn execute(&self, ctx: &mut Context<'_>, msg: &Message<'_>) {
        let nick = msg.arg(0).unwrap_or_default();
        if ctx.me().nick.as_deref() == Some(nick) {
            return;
        }
        if ctx.me().is_registered() {
            let old_source = ctx.source();
            ctx.state.set_nick(ctx.client, nick);
            let line = format!(":{} NICK {}", old_source, nick);
            ctx.send_line(line.clone());
            for peer in ctx.state.channel_peers(ctx.client) {
                if let Some(peer) = ctx.state.clients.get(&peer) {
                    peer.send_line(line.clone());
                }
            }
            info!("Client {} changed nick to {}", ctx.client, nick);
        } else {
            ctx.state.set_nick(ctx.client, nick);
            try_register(ctx);
        }
    }
}

pub(crate) struct UserCommand;

impl Command for UserCommand {
    fn validate(&self, ctx: &Context<'_>, msg: &Message<'_>) -> Result<(), CommandError> {
        if ctx.me().is_registered() {
            return Err(CommandError::AlreadyRegistered);
        }
        if msg.arg_count() < 4 || msg.nonempty_arg(0).is_none_or(|u| validate_username(u).is_err())
        {
            return Err(CommandError::NeedMoreParams(msg.name()));
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut Context<'_>, msg: &Message<'_>) {
        if let Some(me) = ctx.me_mut() {
            me.username = msg.arg(0).map(|s| s.to_string());
            me.realname = msg.arg(3).map(|s| s.to_string());
        }
        try_register(ctx);
    }
}

pub(crate) struct PingCommand;

impl Command for PingCommand {
    fn validate(&self, _: &Context<'_>, msg: &Message<'_>) -> Result<(), CommandError> {
        msg.nonempty_arg(0).map(|_| ()).ok_or(CommandError::NoOrigin)
    }

    fn execute(&self, ctx: &mut Context<'_>, msg: &Message<'_>) {
        let token = msg.arg(0).unwrap_or_default();
        ctx.reply(format!("PONG {} :{}", ctx.config.name, token));
    }
}

pub(crate) struct PongCommand;

impl Command for PongCommand {
    fn validate(&self, _: &Context<'_>, _: &Message<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn execute(&self, ctx: &mut Context<'_>, _: &Message<'_>) {
        if let Some(me) = ctx.me_mut() {
            me.ping_sent = None;
        }
    }
}

pub(crate) struct QuitCommand;

impl Command for QuitCommand {
    fn validate(&self, _: &Context<'_>, _: &Message<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn execute(&self, ctx: &mut Context<'_>, msg: &Message<'_>) {
        let reason = msg.nonempty_arg(0).unwrap_or("Client Quit");
        let host = ctx.me().hostname.clone();
        ctx.send_line(format!("ERROR :Closing Link: {} (Quit: {})", host, reason));
        if let Some(me) = ctx.me_mut() {
            me.close(&format!("Quit: {}", reason));
        }
        info!("Client {} quit: {}", ctx.client, reason);
    }
}

pub(crate) struct AwayCommand;

impl Command for AwayCommand {
    fn validate(&self, _: &Context<'_>, _: &Message<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn execute(&self, ctx: &mut Context<'_>, msg: &Message<'_>) {
        let text = msg.nonempty_arg(0);
        if let Some(me) = ctx.me_mut() {
            me.away = text.map(|s| s.to_string());
            if text.is_some() {
                me.modes |= UserMode::Away;
            } else {
                me.modes -= UserMode::Away;
            }
        }
        let client = ctx.client_name();
        if text.is_some() {
            ctx.reply(RplNowAway306 { client: &client });
        } else {
            ctx.reply(RplUnAway305 { client: &client });
        }
    }
}

pub(crate) struct ShutdownCommand;

impl Command for ShutdownCommand {
    fn validate(&self, _: &Context<'_>, _: &Message<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn execute(&self, ctx: &mut Context<'_>, _: &Message<'_>) {
        info!("Shutdown requested by {}", ctx.me().source());
        for client in ctx.state.clients.values_mut() {
            client.send_line(format!(
                "ERROR :Closing Link: {} (Server shutdown)",
                client.hostname
            ));
            client.force_close("Server shutdown");
        }
        if let Some(quit_sender) = ctx.state.quit_sender.take() {
            if quit_sender.send("Server shutdown".to_string()).is_err() {
                warn!("Listener already stopped");
            }
        }
    }
}

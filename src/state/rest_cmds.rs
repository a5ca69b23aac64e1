// rest_cmds.rs - rest of commands
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

use super::dispatch::{Command, CommandError, Context};
use super::{Channel, ChannelMode, Client, MemberMode};
use crate::command::Message;
use crate::reply::Reply::*;
use crate::utils::*;

// check whether client can send to the channel.
fn can_send_to_channel(ctx: &Context<'_>, channel: &Channel) -> bool {
    let me = ctx.me();
    let is_member = channel.is_member(ctx.client);
    if !is_member && channel.check_channel_modes(ChannelMode::NoExternal) {
        return false;
    }
    !channel.check_member_modes(Some(ctx.client), me.client_name(), MemberMode::Banned)
}

fn deliver_message(ctx: &Context<'_>, msg: &Message<'_>, notice: bool) {
    let (Some(targets), Some(text)) = (msg.nonempty_arg(0), msg.nonempty_arg(1)) else {
        return;
    };
    let command = msg.name();
    let source = ctx.source();
    let report = |e: CommandError| {
        if !notice {
            ctx.error(e);
        }
    };

    for target in targets.split(',') {
        if is_channel(target) {
            let Some(channel) = ctx.state.channels.get(target) else {
                report(CommandError::NoSuchChannel(target.to_string()));
                continue;
            };
            if !can_send_to_channel(ctx, channel) {
                report(CommandError::CannotSendToChannel(target.to_string()));
                continue;
            }
            ctx.state.send_to_channel(
                target,
                &source,
                format!("{} {} :{}", command, target, text),
                Some(ctx.client),
            );
        } else {
            let Some(client) = ctx.state.client_by_nick(target) else {
                report(CommandError::NoSuchNick(target.to_string()));
                continue;
            };
            client.send_msg_display(&source, format!("{} {} :{}", command, target, text));
            if !notice {
                if let Some(ref away) = client.away {
                    let me = ctx.client_name();
                    ctx.reply(RplAway301 {
                        client: &me,
                        nick: target,
                        message: away,
                    });
                }
            }
        }
    }
}

pub(crate) struct PrivMsgCommand;

impl Command for PrivMsgCommand {
    fn validate(&self, _: &Context<'_>, msg: &Message<'_>) -> Result<(), CommandError> {
        if msg.nonempty_arg(0).is_none() {
            return Err(CommandError::NoRecipient(msg.name()));
        }
        if msg.nonempty_arg(1).is_none() {
            return Err(CommandError::NoTextToSend);
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut Context<'_>, msg: &Message<'_>) {
        deliver_message(ctx, msg, false);
    }
}

pub(crate) struct NoticeCommand;

impl Command for NoticeCommand {
    fn validate(&self, _: &Context<'_>, _: &Message<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn execute(&self, ctx: &mut Context<'_>, msg: &Message<'_>) {
        deliver_message(ctx, msg, true);
    }
}

// H - here, G - gone, then channel prefix.
fn who_flags(client: &Client, channel: Option<&Channel>) -> String {
    let mut flags = if client.is_away() { "G" } else { "H" }.to_string();
    if let Some(modes) = channel.and_then(|c| c.members.get(&client.id)) {
        if modes.contains(MemberMode::Operator) {
            flags.push('@');
        } else if modes.contains(MemberMode::Voice) {
            flags.push('+');
        }
    }
    flags
}

fn send_who_reply(ctx: &Context<'_>, client: &Client, channel: Option<&Channel>) {
    let me = ctx.client_name();
    ctx.reply(RplWhoReply352 {
        client: &me,
        channel: channel.map_or("*", |c| c.name.as_str()),
        username: client.username.as_deref().unwrap_or("*"),
        host: &client.hostname,
        server: &ctx.config.name,
        nick: client.client_name(),
        flags: &who_flags(client, channel),
        hopcount: 0,
        realname: client.realname.as_deref().unwrap_or_default(),
    });
}

pub(crate) struct WhoCommand;

impl Command for WhoCommand {
    fn validate(&self, _: &Context<'_>, _: &Message<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn execute(&self, ctx: &mut Context<'_>, msg: &Message<'_>) {
        let mask = msg.nonempty_arg(0).unwrap_or("*");
        if is_channel(mask) {
            if let Some(channel) = ctx.state.channels.get(mask) {
                let viewer_is_member = channel.is_member(ctx.client);
                if ctx.state.can_see_channel(channel, ctx.client) {
                    for id in channel.members.keys() {
                        if let Some(client) = ctx.state.clients.get(id) {
                            if viewer_is_member || !client.is_invisible() {
                                send_who_reply(ctx, client, Some(channel));
                            }
                        }
                    }
                }
            }
        } else if mask == "*" || mask == "0" {
            let peers = ctx.state.channel_peers(ctx.client);
            let mut clients = ctx
                .state
                .clients
                .values()
                .filter(|c| c.is_registered())
                .filter(|c| c.id == ctx.client || !c.is_invisible() || peers.contains(&c.id))
                .collect::<Vec<_>>();
            clients.sort_by_key(|c| c.id);
            for client in clients {
                send_who_reply(ctx, client, None);
            }
        } else if let Some(client) = ctx.state.client_by_nick(mask) {
            send_who_reply(ctx, client, None);
        }
        let client = ctx.client_name();
        ctx.reply(RplEndOfWho315 {
            client: &client,
            mask,
        });
    }
}

pub(crate) struct WhoIsCommand;

impl Command for WhoIsCommand {
    fn validate(&self, ctx: &Context<'_>, msg: &Message<'_>) -> Result<(), CommandError> {
        let nick = msg.nonempty_arg(0).ok_or(CommandError::NoNicknameGiven)?;
        match ctx.state.client_by_nick(nick) {
            Some(client) if client.is_registered() => Ok(()),
            _ => Err(CommandError::NoSuchNick(nick.to_string())),
        }
    }

    fn execute(&self, ctx: &mut Context<'_>, msg: &Message<'_>) {
        let nick = msg.arg(0).unwrap_or_default();
        let Some(target) = ctx.state.client_by_nick(nick) else {
            return;
        };
        let client = ctx.client_name();
        ctx.reply(RplWhoIsUser311 {
            client: &client,
            nick,
            username: target.username.as_deref().unwrap_or("*"),
            host: &target.hostname,
            realname: target.realname.as_deref().unwrap_or_default(),
        });
        let channels = target
            .channels
            .iter()
            .filter_map(|chname| ctx.state.channels.get(chname))
            .filter(|ch| ctx.state.can_see_channel(ch, ctx.client))
            .map(|ch| {
                if ch.is_operator(target.id) {
                    format!("@{}", ch.name)
                } else {
                    ch.name.clone()
                }
            })
            .collect::<Vec<_>>();
        if !channels.is_empty() {
            ctx.reply(RplWhoIsChannels319 {
                client: &client,
                nick,
                channels: &channels,
            });
        }
        ctx.reply(RplWhoIsServer312 {
            client: &client,
            nick,
            server: &ctx.config.name,
            server_info: &ctx.config.info,
        });
        if let Some(ref away) = target.away {
            ctx.reply(RplAway301 {
                client: &client,
                nick,
                message: away,
            });
        }
        ctx.reply(RplWhoIsIdle317 {
            client: &client,
            nick,
            secs: target.last_activity.elapsed().as_secs(),
            signon: target.signon,
        });
        ctx.reply(RplEndOfWhoIs318 {
            client: &client,
            nick,
        });
    }
}

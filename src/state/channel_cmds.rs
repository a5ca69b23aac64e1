// channel_cmds.rs - channel commands
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

use super::dispatch::{Command, CommandError, Context};
use super::{Channel, ChannelMode, ChannelTopic, JoinOutcome, MemberMode, UserMode};
use crate::command::Message;
use crate::reply::Reply::*;
use crate::utils::*;

// find channel by name.
fn get_channel<'c>(ctx: &'c Context<'_>, name: &str) -> Result<&'c Channel, CommandError> {
    ctx.state
        .channels
        .get(name)
        .ok_or_else(|| CommandError::NoSuchChannel(name.to_string()))
}

// find channel where the issuing client is member.
fn get_joined_channel<'c>(ctx: &'c Context<'_>, name: &str) -> Result<&'c Channel, CommandError> {
    let channel = get_channel(ctx, name)?;
    if channel.is_member(ctx.client) {
        Ok(channel)
    } else {
        Err(CommandError::NotOnChannel(name.to_string()))
    }
}

fn send_names(ctx: &Context<'_>, channel: &Channel) {
    let client = ctx.client_name();
    let names = ctx.state.channel_names(channel, ctx.client);
    let symbol = if channel.check_channel_modes(ChannelMode::Secret) {
        "@"
    } else {
        "="
    };
    if !names.is_empty() {
        ctx.reply(RplNameReply353 {
            client: &client,
            symbol,
            channel: &channel.name,
            replies: &names,
        });
    }
}

fn send_topic(ctx: &Context<'_>, channel: &Channel) {
    let client = ctx.client_name();
    match channel.topic {
        Some(ref topic) => {
            ctx.reply(RplTopic332 {
                client: &client,
                channel: &channel.name,
                topic: &topic.topic,
            });
            ctx.reply(RplTopicWhoTime333 {
                client: &client,
                channel: &channel.name,
                nick: &topic.nick,
                setat: topic.set_time,
            });
        }
        None => ctx.reply(RplNoTopic331 {
            client: &client,
            channel: &channel.name,
        }),
    }
}

// PART line to all members, then leave.
fn part_channel(ctx: &mut Context<'_>, chname: &str, reason: Option<&str>) {
    let source = ctx.source();
    match reason {
        Some(reason) => {
            ctx.state
                .send_to_channel(chname, &source, format!("PART {} :{}", chname, reason), None)
        }
        None => ctx
            .state
            .send_to_channel(chname, &source, format!("PART {}", chname), None),
    }
    ctx.state.leave_channel(ctx.client, chname);
}

pub(crate) struct JoinCommand;

impl Command for JoinCommand {
    fn validate(&self, _: &Context<'_>, msg: &Message<'_>) -> Result<(), CommandError> {
        msg.nonempty_arg(0)
            .map(|_| ())
            .ok_or_else(|| CommandError::NeedMoreParams(msg.name()))
    }

    fn execute(&self, ctx: &mut Context<'_>, msg: &Message<'_>) {
        let chans = msg.arg(0).unwrap_or_default();
        if chans == "0" {
            let joined = ctx.me().channels.iter().cloned().collect::<Vec<_>>();
            for chname in joined {
                part_channel(ctx, &chname, None);
            }
            return;
        }
        let keys = msg
            .arg(1)
            .map(|k| k.split(',').collect::<Vec<_>>())
            .unwrap_or_default();
        for (i, chname) in chans.split(',').enumerate() {
            let key = keys.get(i).copied().filter(|k| !k.is_empty());
            match ctx.state.join_channel(ctx.client, chname, key) {
                Ok(JoinOutcome::Joined { created }) => {
                    let source = ctx.source();
                    ctx.state
                        .send_to_channel(chname, &source, format!("JOIN {}", chname), None);
                    if let Some(channel) = ctx.state.channels.get(chname) {
                        let client = ctx.client_name();
                        send_names(ctx, channel);
                        ctx.reply(RplEndOfNames366 {
                            client: &client,
                            channel: chname,
                        });
                        if !created {
                            send_topic(ctx, channel);
                        }
                    }
                    debug!("Client {} joined {}", ctx.client, chname);
                }
                Ok(JoinOutcome::AlreadyMember) => {}
                Err(e) => ctx.error(e),
            }
        }
    }
}

pub(crate) struct PartCommand;

impl Command for PartCommand {
    fn validate(&self, _: &Context<'_>, msg: &Message<'_>) -> Result<(), CommandError> {
        msg.nonempty_arg(0)
            .map(|_| ())
            .ok_or_else(|| CommandError::NeedMoreParams(msg.name()))
    }

    fn execute(&self, ctx: &mut Context<'_>, msg: &Message<'_>) {
        let reason = msg.nonempty_arg(1);
        for chname in msg.arg(0).unwrap_or_default().split(',') {
            match get_joined_channel(ctx, chname).map(|_| ()) {
                Ok(()) => part_channel(ctx, chname, reason),
                Err(e) => ctx.error(e),
            }
        }
    }
}

pub(crate) struct TopicCommand;

impl Command for TopicCommand {
    fn validate(&self, ctx: &Context<'_>, msg: &Message<'_>) -> Result<(), CommandError> {
        let chname = msg
            .nonempty_arg(0)
            .ok_or_else(|| CommandError::NeedMoreParams(msg.name()))?;
        let channel = get_joined_channel(ctx, chname)?;
        if msg.arg_count() > 1
            && channel.check_channel_modes(ChannelMode::TopicOps)
            && !channel.is_operator(ctx.client)
        {
            return Err(CommandError::ChanOpPrivsNeeded(chname.to_string()));
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut Context<'_>, msg: &Message<'_>) {
        let chname = msg.arg(0).unwrap_or_default();
        let Some(text) = msg.arg(1) else {
            if let Some(channel) = ctx.state.channels.get(chname) {
                send_topic(ctx, channel);
            }
            return;
        };
        let nick = ctx.client_name();
        if let Some(channel) = ctx.state.channels.get_mut(chname) {
            channel.topic = if text.is_empty() {
                None
            } else {
                Some(ChannelTopic::new_with_nick(text.to_string(), nick))
            };
        }
        let source = ctx.source();
        ctx.state
            .send_to_channel(chname, &source, format!("TOPIC {} :{}", chname, text), None);
    }
}

pub(crate) struct NamesCommand;

impl Command for NamesCommand {
    fn validate(&self, _: &Context<'_>, _: &Message<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn execute(&self, ctx: &mut Context<'_>, msg: &Message<'_>) {
        let client = ctx.client_name();
        match msg.nonempty_arg(0) {
            Some(chans) => {
                for chname in chans.split(',') {
                    if let Some(channel) = ctx.state.channels.get(chname) {
                        if ctx.state.can_see_channel(channel, ctx.client) {
                            send_names(ctx, channel);
                        }
                    }
                    ctx.reply(RplEndOfNames366 {
                        client: &client,
                        channel: chname,
                    });
                }
            }
            None => {
                for channel in ctx.state.channels.values() {
                    if ctx.state.can_see_channel(channel, ctx.client) {
                        send_names(ctx, channel);
                    }
                }
                ctx.reply(RplEndOfNames366 {
                    client: &client,
                    channel: "*",
                });
            }
        }
    }
}

pub(crate) struct ListCommand;

impl Command for ListCommand {
    fn validate(&self, _: &Context<'_>, _: &Message<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn execute(&self, ctx: &mut Context<'_>, msg: &Message<'_>) {
        let client = ctx.client_name();
        ctx.reply(RplListStart321 { client: &client });
        let channels: Vec<&Channel> = match msg.nonempty_arg(0) {
            Some(chans) => chans
                .split(',')
                .filter_map(|c| ctx.state.channels.get(c))
                .collect(),
            None => ctx.state.channels.values().collect(),
        };
        for channel in channels {
            if !ctx.state.can_see_channel(channel, ctx.client) {
                continue;
            }
            ctx.reply(RplList322 {
                client: &client,
                channel: &channel.name,
                client_count: ctx.state.channel_names(channel, ctx.client).len(),
                topic: channel.topic.as_ref().map_or("", |t| t.topic.as_str()),
            });
        }
        ctx.reply(RplListEnd323 { client: &client });
    }
}

pub(crate) struct InviteCommand;

impl Command for InviteCommand {
    fn validate(&self, ctx: &Context<'_>, msg: &Message<'_>) -> Result<(), CommandError> {
        let (Some(nick), Some(chname)) = (msg.nonempty_arg(0), msg.nonempty_arg(1)) else {
            return Err(CommandError::NeedMoreParams(msg.name()));
        };
        let target = ctx
            .state
            .find_nick(nick)
            .ok_or_else(|| CommandError::NoSuchNick(nick.to_string()))?;
        let channel = get_joined_channel(ctx, chname)?;
        if channel.is_member(target) {
            return Err(CommandError::UserOnChannel(
                nick.to_string(),
                chname.to_string(),
            ));
        }
        if channel.check_channel_modes(ChannelMode::InviteOnly) && !channel.is_operator(ctx.client)
        {
            return Err(CommandError::ChanOpPrivsNeeded(chname.to_string()));
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut Context<'_>, msg: &Message<'_>) {
        let nick = msg.arg(0).unwrap_or_default();
        let chname = msg.arg(1).unwrap_or_default();
        let Some(target) = ctx.state.find_nick(nick) else {
            return;
        };
        if let Some(channel) = ctx.state.channels.get_mut(chname) {
            channel.set_member_modes(Some(target), nick, MemberMode::Invited, false);
        }
        let client = ctx.client_name();
        ctx.reply(RplInviting341 {
            client: &client,
            nick,
            channel: chname,
        });
        if let Some(target) = ctx.state.clients.get(&target) {
            target.send_msg_display(&ctx.source(), format!("INVITE {} :{}", nick, chname));
        }
    }
}

pub(crate) struct KickCommand;

impl Command for KickCommand {
    fn validate(&self, ctx: &Context<'_>, msg: &Message<'_>) -> Result<(), CommandError> {
        let (Some(chname), Some(_)) = (msg.nonempty_arg(0), msg.nonempty_arg(1)) else {
            return Err(CommandError::NeedMoreParams(msg.name()));
        };
        let channel = get_joined_channel(ctx, chname)?;
        if !channel.is_operator(ctx.client) {
            return Err(CommandError::ChanOpPrivsNeeded(chname.to_string()));
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut Context<'_>, msg: &Message<'_>) {
        let chname = msg.arg(0).unwrap_or_default();
        let issuer = ctx.client_name();
        let reason = msg.nonempty_arg(2).unwrap_or(issuer.as_str());
        let source = ctx.source();
        for nick in msg.arg(1).unwrap_or_default().split(',') {
            let target = ctx.state.find_nick(nick).filter(|id| {
                ctx.state
                    .channels
                    .get(chname)
                    .is_some_and(|c| c.is_member(*id))
            });
            let Some(target) = target else {
                ctx.error(CommandError::UserNotInChannel(
                    nick.to_string(),
                    chname.to_string(),
                ));
                continue;
            };
            ctx.state.send_to_channel(
                chname,
                &source,
                format!("KICK {} {} :{}", chname, nick, reason),
                None,
            );
            ctx.state.leave_channel(target, chname);
            info!("{} kicked {} from {}", issuer, nick, chname);
        }
    }
}

// mode string "b" or "+b" without parameter lists bans.
fn is_ban_list_query(msg: &Message<'_>) -> bool {
    msg.arg_count() == 2 && matches!(msg.arg(1), Some("b") | Some("+b"))
}

pub(crate) struct ModeCommand;

impl Command for ModeCommand {
    fn validate(&self, ctx: &Context<'_>, msg: &Message<'_>) -> Result<(), CommandError> {
        let target = msg
            .nonempty_arg(0)
            .ok_or_else(|| CommandError::NeedMoreParams(msg.name()))?;
        if is_channel(target) {
            let channel = get_channel(ctx, target)?;
            if msg.arg_count() > 1 && !is_ban_list_query(msg) && !channel.is_operator(ctx.client)
            {
                return Err(CommandError::ChanOpPrivsNeeded(target.to_string()));
            }
        } else {
            if ctx.state.find_nick(target).is_none() {
                return Err(CommandError::NoSuchNick(target.to_string()));
            }
            if ctx.me().nick.as_deref() != Some(target) {
                return Err(CommandError::UsersDontMatch);
            }
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut Context<'_>, msg: &Message<'_>) {
        let target = msg.arg(0).unwrap_or_default();
        if is_channel(target) {
            if msg.arg_count() == 1 {
                channel_mode_query(ctx, target);
            } else if is_ban_list_query(msg) {
                ban_list(ctx, target);
            } else {
                channel_mode_change(ctx, target, msg);
            }
        } else {
            user_mode(ctx, msg);
        }
    }
}

fn channel_mode_query(ctx: &Context<'_>, chname: &str) {
    let Some(channel) = ctx.state.channels.get(chname) else {
        return;
    };
    let client = ctx.client_name();
    ctx.reply(RplChannelModeIs324 {
        client: &client,
        channel: chname,
        modestring: &channel.modes_string(channel.is_member(ctx.client)),
    });
    ctx.reply(RplCreationTime329 {
        client: &client,
        channel: chname,
        creation_time: channel.creation_time,
    });
}

fn ban_list(ctx: &Context<'_>, chname: &str) {
    let Some(channel) = ctx.state.channels.get(chname) else {
        return;
    };
    let client = ctx.client_name();
    for mask in ctx.state.channel_bans(channel) {
        ctx.reply(RplBanList367 {
            client: &client,
            channel: chname,
            mask: &mask,
        });
    }
    ctx.reply(RplEndOfBanList368 {
        client: &client,
        channel: chname,
    });
}

// accumulates applied changes like "+o-k bob".
#[derive(Default)]
struct ModeChanges {
    modes: String,
    params: Vec<String>,
    last_sign: Option<bool>,
}

impl ModeChanges {
    fn push(&mut self, remove: bool, c: char, param: Option<&str>) {
        if self.last_sign != Some(remove) {
            self.modes.push(if remove { '-' } else { '+' });
            self.last_sign = Some(remove);
        }
        self.modes.push(c);
        if let Some(param) = param {
            self.params.push(param.to_string());
        }
    }

    fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}

impl std::fmt::Display for ModeChanges {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.modes)?;
        for p in &self.params {
            write!(f, " {}", p)?;
        }
        Ok(())
    }
}

fn channel_mode_change(ctx: &mut Context<'_>, chname: &str, msg: &Message<'_>) {
    let modestring = msg.arg(1).unwrap_or_default();
    let mut param_idx = 2;
    let mut remove = false;
    let mut changes = ModeChanges::default();

    for c in modestring.chars() {
        match c {
            '+' => remove = false,
            '-' => remove = true,
            's' | 't' | 'i' | 'n' => {
                if let (Some(mode), Some(channel)) =
                    (ChannelMode::from_char(c), ctx.state.channels.get_mut(chname))
                {
                    channel.set_channel_modes(mode, remove);
                    changes.push(remove, c, None);
                }
            }
            'k' => {
                let param = msg.nonempty_arg(param_idx);
                if param.is_some() {
                    param_idx += 1;
                }
                let Some(channel) = ctx.state.channels.get_mut(chname) else {
                    return;
                };
                if remove {
                    channel.set_channel_modes(ChannelMode::KeyRequired, true);
                    changes.push(true, c, None);
                } else if let Some(key) = param {
                    channel.set_password(key.to_string());
                    changes.push(false, c, Some(key));
                } else {
                    ctx.error(CommandError::NeedMoreParams(msg.name()));
                }
            }
            'o' | 'v' | 'b' => {
                let Some(param) = msg.nonempty_arg(param_idx) else {
                    if c != 'b' {
                        ctx.error(CommandError::NeedMoreParams(msg.name()));
                    }
                    continue;
                };
                param_idx += 1;
                // ban masks from the ban list are accepted, only nick counts
                let nick = param.split_once('!').map_or(param, |(nick, _)| nick);
                let Some(mode) = MemberMode::from_char(c) else {
                    continue;
                };
                let id = ctx.state.find_nick(nick);
                let is_member = ctx
                    .state
                    .channels
                    .get(chname)
                    .is_some_and(|ch| id.is_some_and(|id| ch.is_member(id)));
                if c != 'b' && !is_member {
                    ctx.error(CommandError::UserNotInChannel(
                        nick.to_string(),
                        chname.to_string(),
                    ));
                    continue;
                }
                let Some(channel) = ctx.state.channels.get_mut(chname) else {
                    return;
                };
                let ops_before = channel.operators();
                channel.set_member_modes(id, nick, mode, remove);
                if c != 'o' {
                    changes.push(remove, c, Some(nick));
                    continue;
                }
                // report operator changes that really happened, including
                // a promotion made to keep the channel with an operator
                let ops_after = channel.operators();
                for lost in ops_before.difference(&ops_after) {
                    changes.push(true, c, Some(ctx.state.nick_of(*lost)));
                }
                for gained in ops_after.difference(&ops_before) {
                    changes.push(false, c, Some(ctx.state.nick_of(*gained)));
                }
            }
            _ => ctx.error(CommandError::UnknownMode(c, chname.to_string())),
        }
    }

    if !changes.is_empty() {
        let source = ctx.source();
        ctx.state
            .send_to_channel(chname, &source, format!("MODE {} {}", chname, changes), None);
        debug!("Mode of {} changed: {}", chname, changes);
    }
}

fn user_mode(ctx: &mut Context<'_>, msg: &Message<'_>) {
    let client = ctx.client_name();
    let Some(modestring) = msg.arg(1) else {
        ctx.reply(RplUModeIs221 {
            client: &client,
            user_modes: &ctx.me().modes_string(),
        });
        return;
    };
    let mut remove = false;
    let mut changes = ModeChanges::default();
    let mut unknown = false;
    for c in modestring.chars() {
        match c {
            '+' => remove = false,
            '-' => remove = true,
            'i' => {
                if let Some(me) = ctx.me_mut() {
                    if remove {
                        me.modes -= UserMode::Invisible;
                    } else {
                        me.modes |= UserMode::Invisible;
                    }
                }
                changes.push(remove, c, None);
            }
            _ => unknown = true,
        }
    }
    if unknown {
        ctx.error(CommandError::UmodeUnknownFlag);
    }
    if !changes.is_empty() {
        let source = ctx.source();
        ctx.send_line(format!(":{} MODE {} :{}", source, client, changes));
    }
}

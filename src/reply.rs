// reply.rs - numeric replies
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

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Reply<'a> {
    RplWelcome001 {
        client: &'a str,
        networkname: &'a str,
        nick: &'a str,
        user: &'a str,
        host: &'a str,
    },
    RplYourHost002 {
        client: &'a str,
        servername: &'a str,
        version: &'a str,
    },
    RplCreated003 {
        client: &'a str,
        datetime: &'a str,
    },
    RplMyInfo004 {
        client: &'a str,
        servername: &'a str,
        version: &'a str,
        avail_user_modes: &'a str,
        avail_chmodes: &'a str,
    },
    RplUModeIs221 {
        client: &'a str,
        user_modes: &'a str,
    },
    RplAway301 {
        client: &'a str,
        nick: &'a str,
        message: &'a str,
    },
    RplUnAway305 {
        client: &'a str,
    },
    RplNowAway306 {
        client: &'a str,
    },
    RplWhoIsUser311 {
        client: &'a str,
        nick: &'a str,
        username: &'a str,
        host: &'a str,
        realname: &'a str,
    },
    RplWhoIsServer312 {
        client: &'a str,
        nick: &'a str,
        server: &'a str,
        server_info: &'a str,
    },
    RplEndOfWho315 {
        client: &'a str,
        mask: &'a str,
    },
    RplWhoIsIdle317 {
        client: &'a str,
        nick: &'a str,
        secs: u64,
        signon: i64,
    },
    RplEndOfWhoIs318 {
        client: &'a str,
        nick: &'a str,
    },
    RplWhoIsChannels319 {
        client: &'a str,
        nick: &'a str,
        channels: &'a [String],
    },
    RplListStart321 {
        client: &'a str,
    },
    RplList322 {
        client: &'a str,
        channel: &'a str,
        client_count: usize,
        topic: &'a str,
    },
    RplListEnd323 {
        client: &'a str,
    },
    RplChannelModeIs324 {
        client: &'a str,
        channel: &'a str,
        modestring: &'a str,
    },
    RplCreationTime329 {
        client: &'a str,
        channel: &'a str,
        creation_time: i64,
    },
    RplNoTopic331 {
        client: &'a str,
        channel: &'a str,
    },
    RplTopic332 {
        client: &'a str,
        channel: &'a str,
        topic: &'a str,
    },
    RplTopicWhoTime333 {
        client: &'a str,
        channel: &'a str,
        nick: &'a str,
        setat: i64,
    },
    RplInviting341 {
        client: &'a str,
        nick: &'a str,
        channel: &'a str,
    },
    RplWhoReply352 {
        client: &'a str,
        channel: &'a str,
        username: &'a str,
        host: &'a str,
        server: &'a str,
        nick: &'a str,
        flags: &'a str,
        hopcount: usize,
        realname: &'a str,
    },
    RplNameReply353 {
        client: &'a str,
        symbol: &'a str,
        channel: &'a str,
        replies: &'a [String],
    },
    RplEndOfNames366 {
        client: &'a str,
        channel: &'a str,
    },
    RplBanList367 {
        client: &'a str,
        channel: &'a str,
        mask: &'a str,
    },
    RplEndOfBanList368 {
        client: &'a str,
        channel: &'a str,
    },
    RplMotd372 {
        client: &'a str,
        motd: &'a str,
    },
    RplMotdStart375 {
        client: &'a str,
        server: &'a str,
    },
    RplEndOfMotd376 {
        client: &'a str,
    },
    ErrNoSuchNick401 {
        client: &'a str,
        nick: &'a str,
    },
    ErrNoSuchChannel403 {
        client: &'a str,
        channel: &'a str,
    },
    ErrCannotSendToChain404 {
        client: &'a str,
        channel: &'a str,
    },
    ErrNoOrigin409 {
        client: &'a str,
    },
    ErrNoRecipient411 {
        client: &'a str,
        command: &'a str,
    },
    ErrNoTextToSend412 {
        client: &'a str,
    },
    ErrInputTooLong417 {
        client: &'a str,
    },
    ErrUnknownCommand421 {
        client: &'a str,
        command: &'a str,
    },
    ErrNoMotd422 {
        client: &'a str,
    },
    ErrNoNicknameGiven431 {
        client: &'a str,
    },
    ErrErroneusNickname432 {
        client: &'a str,
        nick: &'a str,
    },
    ErrNicknameInUse433 {
        client: &'a str,
        nick: &'a str,
    },
    ErrUserNotInChannel441 {
        client: &'a str,
        nick: &'a str,
        channel: &'a str,
    },
    ErrNotOnChannel442 {
        client: &'a str,
        channel: &'a str,
    },
    ErrUserOnChannel443 {
        client: &'a str,
        nick: &'a str,
        channel: &'a str,
    },
    ErrNotRegistered451 {
        client: &'a str,
    },
    ErrNeedMoreParams461 {
        client: &'a str,
        command: &'a str,
    },
    ErrAlreadyRegistered462 {
        client: &'a str,
    },
    ErrPasswdMismatch464 {
        client: &'a str,
    },
    ErrUnknownMode472 {
        client: &'a str,
        modechar: char,
        channel: &'a str,
    },
    ErrInviteOnlyChan473 {
        client: &'a str,
        channel: &'a str,
    },
    ErrBannedFromChan474 {
        client: &'a str,
        channel: &'a str,
    },
    ErrBadChannelKey475 {
        client: &'a str,
        channel: &'a str,
    },
    ErrBadChanMask476 {
        channel: &'a str,
    },
    ErrChanOpPrivsNeeded482 {
        client: &'a str,
        channel: &'a str,
    },
    ErrUmodeUnknownFlag501 {
        client: &'a str,
    },
    ErrUsersDontMatch502 {
        client: &'a str,
    },
}

use Reply::*;

impl fmt::Display for Reply<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RplWelcome001 {
                client,
                networkname,
                nick,
                user,
                host,
            } => write!(
                f,
                "001 {} :Welcome to the {} Network, {}!{}@{}",
                client, networkname, nick, user, host
            ),
            RplYourHost002 {
                client,
                servername,
                version,
            } => write!(
                f,
                "002 {} :Your host is {}, running version {}",
                client, servername, version
            ),
            RplCreated003 { client, datetime } => {
                write!(f, "003 {} :This server was created {}", client, datetime)
            }
            RplMyInfo004 {
                client,
                servername,
                version,
                avail_user_modes,
                avail_chmodes,
            } => write!(
                f,
                "004 {} {} {} {} {}",
                client, servername, version, avail_user_modes, avail_chmodes
            ),
            RplUModeIs221 { client, user_modes } => write!(f, "221 {} {}", client, user_modes),
            RplAway301 {
                client,
                nick,
                message,
            } => write!(f, "301 {} {} :{}", client, nick, message),
            RplUnAway305 { client } => {
                write!(f, "305 {} :You are no longer marked as being away", client)
            }
            RplNowAway306 { client } => {
                write!(f, "306 {} :You have been marked as being away", client)
            }
            RplWhoIsUser311 {
                client,
                nick,
                username,
                host,
                realname,
            } => write!(
                f,
                "311 {} {} {} {} * :{}",
                client, nick, username, host, realname
            ),
            RplWhoIsServer312 {
                client,
                nick,
                server,
                server_info,
            } => write!(f, "312 {} {} {} :{}", client, nick, server, server_info),
            RplEndOfWho315 { client, mask } => write!(f, "315 {} {} :End of WHO list", client, mask),
            RplWhoIsIdle317 {
                client,
                nick,
                secs,
                signon,
            } => write!(
                f,
                "317 {} {} {} {} :seconds idle, signon time",
                client, nick, secs, signon
            ),
            RplEndOfWhoIs318 { client, nick } => {
                write!(f, "318 {} {} :End of /WHOIS list", client, nick)
            }
            RplWhoIsChannels319 {
                client,
                nick,
                channels,
            } => write!(f, "319 {} {} :{}", client, nick, channels.join(" ")),
            RplListStart321 { client } => write!(f, "321 {} Channel :Users  Name", client),
            RplList322 {
                client,
                channel,
                client_count,
                topic,
            } => write!(f, "322 {} {} {} :{}", client, channel, client_count, topic),
            RplListEnd323 { client } => write!(f, "323 {} :End of /LIST", client),
            RplChannelModeIs324 {
                client,
                channel,
                modestring,
            } => write!(f, "324 {} {} {}", client, channel, modestring),
            RplCreationTime329 {
                client,
                channel,
                creation_time,
            } => write!(f, "329 {} {} {}", client, channel, creation_time),
            RplNoTopic331 { client, channel } => {
                write!(f, "331 {} {} :No topic is set", client, channel)
            }
            RplTopic332 {
                client,
                channel,
                topic,
            } => write!(f, "332 {} {} :{}", client, channel, topic),
            RplTopicWhoTime333 {
                client,
                channel,
                nick,
                setat,
            } => write!(f, "333 {} {} {} {}", client, channel, nick, setat),
            RplInviting341 {
                client,
                nick,
                channel,
            } => write!(f, "341 {} {} {}", client, nick, channel),
            RplWhoReply352 {
                client,
                channel,
                username,
                host,
                server,
                nick,
                flags,
                hopcount,
                realname,
            } => write!(
                f,
                "352 {} {} {} {} {} {} {} :{} {}",
                client, channel, username, host, server, nick, flags, hopcount, realname
            ),
            RplNameReply353 {
                client,
                symbol,
                channel,
                replies,
            } => write!(
                f,
                "353 {} {} {} :{}",
                client,
                symbol,
                channel,
                replies.join(" ")
            ),
            RplEndOfNames366 { client, channel } => {
                write!(f, "366 {} {} :End of /NAMES list", client, channel)
            }
            RplBanList367 {
                client,
                channel,
                mask,
            } => write!(f, "367 {} {} {}", client, channel, mask),
            RplEndOfBanList368 { client, channel } => {
                write!(f, "368 {} {} :End of channel ban list", client, channel)
            }
            RplMotd372 { client, motd } => write!(f, "372 {} :{}", client, motd),
            RplMotdStart375 { client, server } => {
                write!(f, "375 {} :- {} Message of the day - ", client, server)
            }
            RplEndOfMotd376 { client } => write!(f, "376 {} :End of /MOTD command.", client),
            ErrNoSuchNick401 { client, nick } => {
                write!(f, "401 {} {} :No such nick/channel", client, nick)
            }
            ErrNoSuchChannel403 { client, channel } => {
                write!(f, "403 {} {} :No such channel", client, channel)
            }
            ErrCannotSendToChain404 { client, channel } => {
                write!(f, "404 {} {} :Cannot send to channel", client, channel)
            }
            ErrNoOrigin409 { client } => write!(f, "409 {} :No origin specified", client),
            ErrNoRecipient411 { client, command } => {
                write!(f, "411 {} :No recipient given ({})", client, command)
            }
            ErrNoTextToSend412 { client } => write!(f, "412 {} :No text to send", client),
            ErrInputTooLong417 { client } => write!(f, "417 {} :Input line was too long", client),
            ErrUnknownCommand421 { client, command } => {
                write!(f, "421 {} {} :Unknown command", client, command)
            }
            ErrNoMotd422 { client } => write!(f, "422 {} :MOTD File is missing", client),
            ErrNoNicknameGiven431 { client } => write!(f, "431 {} :No nickname given", client),
            ErrErroneusNickname432 { client, nick } => {
                write!(f, "432 {} {} :Erroneus nickname", client, nick)
            }
            ErrNicknameInUse433 { client, nick } => {
                write!(f, "433 {} {} :Nickname is already in use", client, nick)
            }
            ErrUserNotInChannel441 {
                client,
                nick,
                channel,
            } => write!(
                f,
                "441 {} {} {} :They aren't on that channel",
                client, nick, channel
            ),
            ErrNotOnChannel442 { client, channel } => {
                write!(f, "442 {} {} :You're not on that channel", client, channel)
            }
            ErrUserOnChannel443 {
                client,
                nick,
                channel,
            } => write!(f, "443 {} {} {} :is already on channel", client, nick, channel),
            ErrNotRegistered451 { client } => write!(f, "451 {} :You have not registered", client),
            ErrNeedMoreParams461 { client, command } => {
                write!(f, "461 {} {} :Not enough parameters", client, command)
            }
            ErrAlreadyRegistered462 { client } => {
                write!(f, "462 {} :You may not reregister", client)
            }
            ErrPasswdMismatch464 { client } => write!(f, "464 {} :Password incorrect", client),
            ErrUnknownMode472 {
                client,
                modechar,
                channel,
            } => write!(
                f,
                "472 {} {} :is unknown mode char to me for {}",
                client, modechar, channel
            ),
            ErrInviteOnlyChan473 { client, channel } => {
                write!(f, "473 {} {} :Cannot join channel (+i)", client, channel)
            }
            ErrBannedFromChan474 { client, channel } => {
                write!(f, "474 {} {} :Cannot join channel (+b)", client, channel)
            }
            ErrBadChannelKey475 { client, channel } => {
                write!(f, "475 {} {} :Cannot join channel (+k)", client, channel)
            }
            ErrBadChanMask476 { channel } => write!(f, "476 {} :Bad Channel Mask", channel),
            ErrChanOpPrivsNeeded482 { client, channel } => {
                write!(f, "482 {} {} :You're not channel operator", client, channel)
            }
            ErrUmodeUnknownFlag501 { client } => write!(f, "501 {} :Unknown MODE flag", client),
            ErrUsersDontMatch502 { client } => {
                write!(f, "502 {} :Cant change mode for other users", client)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_replies() {
        assert_eq!(
            "001 alice :Welcome to the TestNet Network, alice!al@127.0.0.1",
            RplWelcome001 {
                client: "alice",
                networkname: "TestNet",
                nick: "alice",
                user: "al",
                host: "127.0.0.1"
            }
            .to_string()
        );
        assert_eq!(
            "353 alice = #town :@alice bob",
            RplNameReply353 {
                client: "alice",
                symbol: "=",
                channel: "#town",
                replies: &["@alice".to_string(), "bob".to_string()]
            }
            .to_string()
        );
        assert_eq!(
            "411 bob :No recipient given (PRIVMSG)",
            ErrNoRecipient411 {
                client: "bob",
                command: "PRIVMSG"
            }
            .to_string()
        );
        assert_eq!(
            "472 bob x :is unknown mode char to me for #town",
            ErrUnknownMode472 {
                client: "bob",
                modechar: 'x',
                channel: "#town"
            }
            .to_string()
        );
        assert_eq!(
            "352 alice #town al 127.0.0.1 irc.irc bob H@ :0 Bob B",
            RplWhoReply352 {
                client: "alice",
                channel: "#town",
                username: "al",
                host: "127.0.0.1",
                server: "irc.irc",
                nick: "bob",
                flags: "H@",
                hopcount: 0,
                realname: "Bob B"
            }
            .to_string()
        );
    }
}

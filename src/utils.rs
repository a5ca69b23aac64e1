// utils.rs - main utilities
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

use chrono::Utc;
use validator::ValidationError;

pub(crate) const MAX_CHANNEL_NAME_LENGTH: usize = 200;
pub(crate) const MAX_NICK_LENGTH: usize = 30;

pub(crate) fn is_channel(name: &str) -> bool {
    name.starts_with('#')
}

// channel name must be short and printable. The '#' sigil is checked apart.
pub(crate) fn validate_channel(name: &str) -> Result<(), ValidationError> {
    if name.chars().count() <= MAX_CHANNEL_NAME_LENGTH
        && name
            .chars()
            .all(|c| !c.is_control() && !c.is_whitespace() && c != ',')
    {
        Ok(())
    } else {
        Err(ValidationError::new("Channel name is invalid"))
    }
}

fn is_nick_special(c: char) -> bool {
    matches!(c, '[' | ']' | '\\' | '`' | '_' | '^' | '{' | '|' | '}')
}

pub(crate) fn validate_nickname(nick: &str) -> Result<(), ValidationError> {
    let mut chars = nick.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || is_nick_special(c));
    if first_ok
        && nick.len() <= MAX_NICK_LENGTH
        && chars.all(|c| c.is_ascii_alphanumeric() || is_nick_special(c) || c == '-')
    {
        Ok(())
    } else {
        Err(ValidationError::new("Nickname is invalid"))
    }
}

pub(crate) fn validate_username(username: &str) -> Result<(), ValidationError> {
    if !username.is_empty()
        && username
            .chars()
            .all(|c| !c.is_control() && !c.is_whitespace() && c != '@' && c != '!')
    {
        Ok(())
    } else {
        Err(ValidationError::new("Username is invalid"))
    }
}

pub(crate) fn timestamp_now() -> i64 {
    Utc::now().timestamp()
}

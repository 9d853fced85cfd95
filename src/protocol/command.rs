//! Parsed client commands.

use crate::protocol::types::RespValue;

/// A client command: an upper-cased name plus its string arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    /// Builds a command from already tokenized parts.
    pub fn new<I, S>(name: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_uppercase(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Extracts a command from a decoded RESP value.
    ///
    /// Only a non-empty array of bulk or simple strings is a command;
    /// anything else returns `None`.
    pub fn from_value(value: RespValue) -> Option<Self> {
        let elements = match value {
            RespValue::Array(elements) if !elements.is_empty() => elements,
            _ => return None,
        };

        let mut parts = Vec::with_capacity(elements.len());
        for element in elements {
            match element {
                RespValue::BulkString(b) => parts.push(String::from_utf8_lossy(&b).into_owned()),
                RespValue::SimpleString(s) => parts.push(s),
                _ => return None,
            }
        }

        let args = parts.split_off(1);
        Some(Self {
            name: parts[0].to_uppercase(),
            args,
        })
    }

    /// Number of arguments, excluding the command name.
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_value_uppercases_name() {
        let value = RespValue::array(vec![
            RespValue::bulk_string("set"),
            RespValue::bulk_string("Key"),
            RespValue::simple_string("Value"),
        ]);
        let cmd = Command::from_value(value).unwrap();
        assert_eq!(cmd.name, "SET");
        assert_eq!(cmd.args, vec!["Key", "Value"]);
        assert_eq!(cmd.arity(), 2);
    }

    #[test]
    fn test_from_value_rejects_non_commands() {
        assert!(Command::from_value(RespValue::integer(1)).is_none());
        assert!(Command::from_value(RespValue::array(vec![])).is_none());
        assert!(Command::from_value(RespValue::NullArray).is_none());
        assert!(Command::from_value(RespValue::array(vec![
            RespValue::bulk_string("GET"),
            RespValue::Null,
        ]))
        .is_none());
    }
}

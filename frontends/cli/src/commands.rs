//! Line commands understood by the interactive front end

use rolodex_api::{ContactFields, ContactId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Show(ContactId),
    Add(ContactFields),
    Edit(ContactId, ContactFields),
    Delete(ContactId),
    Fav(ContactId),
    Favs,
    Refresh,
    Login { email: String, password: String },
    Signup { email: String, password: String },
    Logout,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  list                       show all contacts
  show <id>                  show one contact
  add key=value...           create a contact (e.g. add name=Ada phone=0812)
  edit <id> key=value...     replace the fields of a contact
  delete <id>                delete a contact
  fav <id>                   toggle favorite
  favs                       show favorite contacts
  refresh                    reload contacts from the store
  login <email> <password>   sign in
  signup <email> <password>  create an account and sign in
  logout                     sign out
  help                       this text
  quit                       exit";

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match (name.to_lowercase().as_str(), args.as_slice()) {
            ("list" | "ls", []) => Command::List,
            ("show", [id]) => Command::Show(ContactId::from(*id)),
            ("add", pairs) if !pairs.is_empty() => Command::Add(parse_fields(pairs)?),
            ("edit", [id, pairs @ ..]) if !pairs.is_empty() => {
                Command::Edit(ContactId::from(*id), parse_fields(pairs)?)
            }
            ("delete" | "rm", [id]) => Command::Delete(ContactId::from(*id)),
            ("fav", [id]) => Command::Fav(ContactId::from(*id)),
            ("favs", []) => Command::Favs,
            ("refresh", []) => Command::Refresh,
            ("login", [email, password]) => Command::Login {
                email: email.to_string(),
                password: password.to_string(),
            },
            ("signup", [email, password]) => Command::Signup {
                email: email.to_string(),
                password: password.to_string(),
            },
            ("logout", []) => Command::Logout,
            ("help" | "?", _) => Command::Help,
            ("quit" | "exit", []) => Command::Quit,
            (other, _) => return Err(format!("unknown or malformed command '{}'", other)),
        };
        Ok(Some(command))
    }
}

fn parse_fields(pairs: &[&str]) -> Result<ContactFields, String> {
    ContactFields::parse_pairs(pairs.iter().copied())
        .map_err(|token| format!("expected key=value, got '{}'", token))
}

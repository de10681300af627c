//! Shell commands - lines typed by the user, parsed into store calls

use anyhow::{anyhow, bail, Result};

use crate::error::StoreResult;
use crate::models::{parse_prep_time, Difficulty, RecipeForm, RecipePatch};

/// Help text listing every command
pub const HELP: &str = "\
Commands:
  login <username> <password>
  signup <username> <email> <password>
  logout
  whoami | profile
  cuisines
  recipes [cuisine]          all recipes, optionally one cuisine (name or id)
  mine                       your recipes
  show <id>
  create name=.. time=.. ingredients=.. instructions=.. difficulty=.. cuisine=..
  edit <id> [field=value ...]  without fields, prints the current values
  delete <id>
  status
  help
  quit

Separate ingredients with '|'. Quote values containing spaces.";

/// Recipe fields given as `key=value` arguments. Cuisine may be a name or an
/// id and is resolved against the loaded cuisine types.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecipeFields {
    pub name: Option<String>,
    pub prep_time: Option<String>,
    pub ingredients: Option<String>,
    pub instructions: Option<String>,
    pub difficulty: Option<String>,
    pub cuisine: Option<String>,
}

impl RecipeFields {
    pub fn is_empty(&self) -> bool {
        *self == RecipeFields::default()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        let slot = match key.to_lowercase().as_str() {
            "name" | "nome" => &mut self.name,
            "time" | "prep" | "preptime" | "tempo" => &mut self.prep_time,
            "ingredients" | "ingredientes" => &mut self.ingredients,
            "instructions" | "steps" | "modo" => &mut self.instructions,
            "difficulty" | "dificuldade" => &mut self.difficulty,
            "cuisine" | "tipo" => &mut self.cuisine,
            other => bail!("Unknown field: {}", other),
        };
        *slot = Some(value);
        Ok(())
    }

    /// Full form for a new recipe, with the cuisine already resolved to an id.
    /// Missing fields stay blank and fail validation.
    pub fn into_form(self, cuisine_type_id: String) -> StoreResult<RecipeForm> {
        Ok(RecipeForm {
            name: self.name.unwrap_or_default(),
            prep_time: self.prep_time.unwrap_or_default(),
            ingredients: self.ingredients.map(ingredient_text).unwrap_or_default(),
            instructions: self.instructions.unwrap_or_default(),
            difficulty: match self.difficulty {
                Some(d) => d.parse::<Difficulty>()?,
                None => Default::default(),
            },
            cuisine_type_id,
        })
    }

    /// Patch carrying only the fields that were given
    pub fn into_patch(self, cuisine_type_id: Option<String>) -> StoreResult<RecipePatch> {
        Ok(RecipePatch {
            name: self.name.map(|n| n.trim().to_string()),
            prep_time_minutes: self.prep_time.as_deref().map(parse_prep_time).transpose()?,
            ingredients: self.ingredients.map(ingredient_text),
            instructions: self.instructions,
            difficulty: self.difficulty.as_deref().map(str::parse::<Difficulty>).transpose()?,
            cuisine_type_id,
        })
    }
}

fn ingredient_text(value: String) -> String {
    value
        .split('|')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}

/// A parsed shell command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Status,
    LogIn { username: String, password: String },
    SignUp { username: String, email: String, password: String },
    LogOut,
    Profile,
    Cuisines,
    Recipes { cuisine: Option<String> },
    Mine,
    Show { id: String },
    Create(RecipeFields),
    Edit { id: String, fields: RecipeFields },
    Delete { id: String },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::Quit => "quit",
            Command::Status => "status",
            Command::LogIn { .. } => "login",
            Command::SignUp { .. } => "signup",
            Command::LogOut => "logout",
            Command::Profile => "profile",
            Command::Cuisines => "cuisines",
            Command::Recipes { .. } => "recipes",
            Command::Mine => "mine",
            Command::Show { .. } => "show",
            Command::Create(_) => "create",
            Command::Edit { .. } => "edit",
            Command::Delete { .. } => "delete",
        }
    }
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let tokens = tokenize(line)?;
    let Some((head, args)) = tokens.split_first() else {
        return Ok(None);
    };

    let command = match head.to_lowercase().as_str() {
        "help" | "?" => {
            no_args(head, args)?;
            Command::Help
        }
        "quit" | "exit" => {
            no_args(head, args)?;
            Command::Quit
        }
        "status" => {
            no_args(head, args)?;
            Command::Status
        }
        "login" => {
            let [username, password] = exact(head, args, "<username> <password>")?;
            Command::LogIn { username, password }
        }
        "signup" | "register" => {
            let [username, email, password] = exact(head, args, "<username> <email> <password>")?;
            Command::SignUp {
                username,
                email,
                password,
            }
        }
        "logout" => {
            no_args(head, args)?;
            Command::LogOut
        }
        "whoami" | "profile" => {
            no_args(head, args)?;
            Command::Profile
        }
        "cuisines" => {
            no_args(head, args)?;
            Command::Cuisines
        }
        "recipes" | "list" => match args {
            [] => Command::Recipes { cuisine: None },
            // cuisine names may contain spaces without quoting
            _ => Command::Recipes {
                cuisine: Some(args.join(" ")),
            },
        },
        "mine" => {
            no_args(head, args)?;
            Command::Mine
        }
        "show" => {
            let [id] = exact(head, args, "<id>")?;
            Command::Show { id }
        }
        "create" | "new" => Command::Create(parse_fields(args)?),
        "edit" => {
            let (id, rest) = args
                .split_first()
                .ok_or_else(|| anyhow!("Usage: edit <id> [field=value ...]"))?;
            Command::Edit {
                id: id.clone(),
                fields: parse_fields(rest)?,
            }
        }
        "delete" | "rm" => {
            let [id] = exact(head, args, "<id>")?;
            Command::Delete { id }
        }
        other => bail!("Unknown command: {} (try 'help')", other),
    };
    Ok(Some(command))
}

fn no_args(head: &str, args: &[String]) -> Result<()> {
    if !args.is_empty() {
        bail!("'{}' takes no arguments", head);
    }
    Ok(())
}

fn exact<const N: usize>(head: &str, args: &[String], usage: &str) -> Result<[String; N]> {
    <[String; N]>::try_from(args.to_vec()).map_err(|_| anyhow!("Usage: {} {}", head, usage))
}

fn parse_fields(args: &[String]) -> Result<RecipeFields> {
    let mut fields = RecipeFields::default();
    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected field=value, got '{}'", arg))?;
        fields.set(key.trim(), value.to_string())?;
    }
    Ok(fields)
}

/// Split a line into words, respecting quotes and backslash escapes
fn tokenize(input: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escape_next = false;

    for c in input.chars() {
        if escape_next {
            current.push(c);
            escape_next = false;
            continue;
        }

        match c {
            '\\' if !in_single_quote => {
                escape_next = true;
                in_token = true;
            }
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                in_token = true;
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                in_token = true;
            }
            c if c.is_whitespace() && !in_single_quote && !in_double_quote => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            _ => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_single_quote || in_double_quote {
        bail!("Unterminated quote");
    }
    if in_token {
        tokens.push(current);
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_tokenize_quotes() {
        let tokens = tokenize(r#"create name="Pad Thai" instructions='stir "well"' x\ y"#).unwrap();
        assert_eq!(
            tokens,
            vec!["create", "name=Pad Thai", "instructions=stir \"well\"", "x y"]
        );
        assert_eq!(tokenize("show ''").unwrap(), vec!["show", ""]);
        assert!(tokenize("login 'ana").is_err());
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(
            parse_command("login ana s3cret").unwrap(),
            Some(Command::LogIn {
                username: "ana".into(),
                password: "s3cret".into()
            })
        );
        assert_eq!(
            parse_command("recipes Middle Eastern").unwrap(),
            Some(Command::Recipes {
                cuisine: Some("Middle Eastern".into())
            })
        );
        assert_eq!(parse_command("QUIT").unwrap(), Some(Command::Quit));
        assert!(parse_command("login ana").is_err());
        assert!(parse_command("logout now").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[test]
    fn test_create_builds_form() {
        let line = concat!(
            "create name=Tacos time=25 ingredients='tortilla | beef|lime' ",
            "instructions=Assemble difficulty=fácil cuisine=Mexican"
        );
        let Some(Command::Create(fields)) = parse_command(line).unwrap() else {
            panic!("expected create");
        };
        assert_eq!(fields.cuisine.as_deref(), Some("Mexican"));

        let draft = fields.into_form("c9".into()).unwrap().into_draft().unwrap();
        assert_eq!(draft.name, "Tacos");
        assert_eq!(draft.prep_time_minutes, 25);
        assert_eq!(draft.ingredients, "tortilla\nbeef\nlime");
        assert_eq!(draft.difficulty, Difficulty::Easy);
        assert_eq!(draft.cuisine_type_id, "c9");
    }

    #[test]
    fn test_create_with_missing_field_fails_validation() {
        let parsed = parse_command("create name=Tacos time=25").unwrap();
        let Some(Command::Create(fields)) = parsed else {
            panic!("expected create");
        };
        let err = fields.into_form("c9".into()).unwrap().into_draft().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_edit_builds_partial_patch() {
        let Some(Command::Edit { id, fields }) =
            parse_command("edit r1 time=40 difficulty=hard").unwrap()
        else {
            panic!("expected edit");
        };
        assert_eq!(id, "r1");
        let patch = fields.into_patch(None).unwrap();
        assert_eq!(
            patch,
            RecipePatch {
                prep_time_minutes: Some(40),
                difficulty: Some(Difficulty::Hard),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_edit_rejects_bad_values() {
        let Some(Command::Edit { fields, .. }) = parse_command("edit r1 time=soon").unwrap() else {
            panic!("expected edit");
        };
        assert_eq!(fields.into_patch(None).unwrap_err().kind(), ErrorKind::Validation);
        assert!(parse_command("edit r1 colour=red").is_err());
        assert!(parse_command("edit r1 name").is_err());
        assert!(parse_command("edit").is_err());
    }
}

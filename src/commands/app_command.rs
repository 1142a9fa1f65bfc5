use crate::search::paged_view::{PageNav, ViewMode};
use crate::search::query::{parse_amount, ExcludedIngredient, FilterState, IngredientFilter, ListFilters};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Formulas(ListFilters),
    Formula {
        object_number: String,
    },
    FormulaPdf {
        object_number: String,
    },
    Options,
    Search(FilterState),
    SearchReset,
    SearchExport,
    Page(PageNav),
    View(ViewMode),
    Ingredients,
    /// 边输入边搜索，走防抖
    IngredientsType {
        term: String,
    },
    /// 立即搜索
    IngredientsSearch {
        term: String,
    },
    IngredientsClear,
    AliasSelect {
        ingredient_id: i64,
    },
    AliasList,
    AliasAdd {
        text: String,
    },
    AliasDelete {
        alias_id: i64,
        confirmed: bool,
    },
    AliasImport {
        file: Option<PathBuf>,
    },
    AliasExport,
    AliasBackup,
    AliasRestore {
        file: Option<PathBuf>,
    },
    BackupCreate,
    BackupList,
    BackupRestore {
        id: String,
        clear_existing: bool,
        confirmed: bool,
    },
    BackupDelete {
        id: String,
        confirmed: bool,
    },
    DbStatus,
    DbUpload {
        file: Option<PathBuf>,
    },
    DbUploadExcel {
        file: Option<PathBuf>,
    },
    DbInit,
    DbExport,
    AuthLogin,
    AuthLogout,
    AuthStatus,
    Help,
    Quit,
    Unknown(String),
}

pub const HELP: &str = "可用命令:
  formulas [brand=..] [category=..] [phase=..]
  formula <object_number> | pdf <object_number> | options
  search [ingredient=名称[:最小[:最大]]]... [exclude=名称|#id]... [brand=..] [category=..] [phase=..] [name=..] [site=..]
  search reset | search export
  page first|prev|next|last|<n> | view list|card
  ingredients | ingredients find <词> | ingredients search <词> | ingredients clear
  alias select <ingredient_id> | alias list | alias add <别名> | alias delete <alias_id> [--yes]
  alias import <csv> | alias export | alias backup | alias restore <json>
  backup create | backup list | backup restore <id> [--clear] [--yes] | backup delete <id> [--yes]
  db status | db upload <json> | db excel <xlsx> | db init | db export
  auth login | auth logout | auth status
  help | quit";

impl FromStr for AppCommand {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = tokenize(s);
        if parts.is_empty() {
            return Ok(AppCommand::Unknown("".to_string()));
        }
        let args: Vec<&str> = parts[1..].iter().map(String::as_str).collect();

        match parts[0].as_str() {
            "formulas" | "list" => Ok(parse_list_filters(&args)),
            "formula" | "detail" => match args.first() {
                Some(obj) => Ok(AppCommand::Formula {
                    object_number: obj.to_string(),
                }),
                None => Ok(AppCommand::Unknown("用法: formula <object_number>".to_string())),
            },
            "pdf" => match args.first() {
                Some(obj) => Ok(AppCommand::FormulaPdf {
                    object_number: obj.to_string(),
                }),
                None => Ok(AppCommand::Unknown("用法: pdf <object_number>".to_string())),
            },
            "options" => Ok(AppCommand::Options),
            "search" => match args.first().copied() {
                Some("reset") => Ok(AppCommand::SearchReset),
                Some("export") => Ok(AppCommand::SearchExport),
                _ => Ok(parse_search(&args)),
            },
            "page" => match args.first().map(|a| a.parse::<PageNav>()) {
                Some(Ok(nav)) => Ok(AppCommand::Page(nav)),
                Some(Err(e)) => Ok(AppCommand::Unknown(e)),
                None => Ok(AppCommand::Unknown(
                    "用法: page first|prev|next|last|<n>".to_string(),
                )),
            },
            "next" => Ok(AppCommand::Page(PageNav::Next)),
            "prev" => Ok(AppCommand::Page(PageNav::Prev)),
            "view" => match args.first().map(|a| a.parse::<ViewMode>()) {
                Some(Ok(mode)) => Ok(AppCommand::View(mode)),
                Some(Err(e)) => Ok(AppCommand::Unknown(e)),
                None => Ok(AppCommand::Unknown("用法: view list|card".to_string())),
            },
            "ingredients" | "ing" => match args.first().copied() {
                None => Ok(AppCommand::Ingredients),
                Some("clear") => Ok(AppCommand::IngredientsClear),
                Some("find") => Ok(AppCommand::IngredientsType {
                    term: args[1..].join(" "),
                }),
                Some("search") => Ok(AppCommand::IngredientsSearch {
                    term: args[1..].join(" "),
                }),
                Some(other) => Ok(AppCommand::Unknown(format!(
                    "未知的 ingredients 子命令: {}",
                    other
                ))),
            },
            "alias" | "aliases" => Ok(parse_alias(&args)),
            "backup" | "backups" => Ok(parse_backup(&args)),
            "db" | "database" => Ok(match args.first().copied() {
                Some("status") => AppCommand::DbStatus,
                Some("upload") => AppCommand::DbUpload {
                    file: args.get(1).map(PathBuf::from),
                },
                Some("excel") => AppCommand::DbUploadExcel {
                    file: args.get(1).map(PathBuf::from),
                },
                Some("init") | Some("initialize") => AppCommand::DbInit,
                Some("export") => AppCommand::DbExport,
                _ => AppCommand::Unknown(
                    "用法: db status | db upload <json> | db excel <xlsx> | db init | db export"
                        .to_string(),
                ),
            }),
            "auth" => Ok(match args.first().copied() {
                Some("login") => AppCommand::AuthLogin,
                Some("logout") => AppCommand::AuthLogout,
                Some("status") | None => AppCommand::AuthStatus,
                Some(other) => AppCommand::Unknown(format!("未知的 auth 子命令: {}", other)),
            }),
            "help" | "h" => Ok(AppCommand::Help),
            "quit" | "q" | "exit" => Ok(AppCommand::Quit),
            _ => Ok(AppCommand::Unknown(format!("未知命令: {}", parts[0]))),
        }
    }
}

/// 按空白切分，支持单/双引号包住含空格的值（`category="Skin Care"`）
pub fn tokenize(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut quote: Option<char> = None;
    let mut in_token = false;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => cur.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    out.push(std::mem::take(&mut cur));
                    in_token = false;
                }
            }
            None => {
                cur.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        out.push(cur);
    }
    out
}

fn split_kv(arg: &str) -> Option<(&str, &str)> {
    arg.split_once('=')
}

fn has_flag(args: &[&str], flag: &str) -> bool {
    args.iter().any(|a| *a == flag)
}

fn parse_list_filters(args: &[&str]) -> AppCommand {
    let mut filters = ListFilters::default();
    for arg in args {
        match split_kv(arg) {
            Some(("brand", v)) => filters.brand = v.to_string(),
            Some(("category", v)) => filters.category = v.to_string(),
            Some(("phase", v)) | Some(("lifecycle_phase", v)) => {
                filters.lifecycle_phase = v.to_string()
            }
            _ => {
                return AppCommand::Unknown(format!(
                    "无法识别的参数: {} (用法: formulas [brand=..] [category=..] [phase=..])",
                    arg
                ))
            }
        }
    }
    AppCommand::Formulas(filters)
}

fn parse_search(args: &[&str]) -> AppCommand {
    let mut filters = FilterState::default();
    for arg in args {
        let Some((key, value)) = split_kv(arg) else {
            return AppCommand::Unknown(format!("无法识别的参数: {}", arg));
        };
        match key {
            "ingredient" | "ing" => match parse_ingredient_row(value) {
                Ok(row) => filters.add_row(row),
                Err(msg) => return AppCommand::Unknown(msg),
            },
            "exclude" => {
                if let Some(id) = value.strip_prefix('#').and_then(|v| v.parse::<i64>().ok()) {
                    filters.exclusions.push(ExcludedIngredient {
                        id: Some(id),
                        name: String::new(),
                    });
                } else {
                    filters.exclude(None, value);
                }
            }
            "brand" => filters.facets.brand = value.to_string(),
            "category" => filters.facets.category = value.to_string(),
            "phase" | "lifecycle_phase" => filters.facets.lifecycle_phase = value.to_string(),
            "name" | "formulation_name" => filters.facets.formulation_name = value.to_string(),
            "site" | "production_site" => filters.facets.production_site = value.to_string(),
            _ => return AppCommand::Unknown(format!("未知的搜索条件: {}", key)),
        }
    }
    AppCommand::Search(filters)
}

/// `名称[:最小[:最大]]`，最小值留空表示不限（`Water::5`）
fn parse_ingredient_row(raw: &str) -> Result<IngredientFilter, String> {
    let mut it = raw.splitn(3, ':');
    let name = it.next().unwrap_or("").to_string();
    let min = parse_amount(it.next().unwrap_or("")).map_err(|e| e.user_message())?;
    let max = parse_amount(it.next().unwrap_or("")).map_err(|e| e.user_message())?;
    Ok(IngredientFilter::between(name, min, max))
}

fn parse_alias(args: &[&str]) -> AppCommand {
    let id_arg = |usage: &str| -> Result<i64, AppCommand> {
        args.get(1)
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| AppCommand::Unknown(usage.to_string()))
    };
    match args.first().copied() {
        Some("select") => match id_arg("用法: alias select <ingredient_id>") {
            Ok(ingredient_id) => AppCommand::AliasSelect { ingredient_id },
            Err(cmd) => cmd,
        },
        Some("list") | None => AppCommand::AliasList,
        Some("add") => AppCommand::AliasAdd {
            text: args[1..].join(" "),
        },
        Some("delete") | Some("rm") => match id_arg("用法: alias delete <alias_id> [--yes]") {
            Ok(alias_id) => AppCommand::AliasDelete {
                alias_id,
                confirmed: has_flag(args, "--yes"),
            },
            Err(cmd) => cmd,
        },
        Some("import") => AppCommand::AliasImport {
            file: args.get(1).map(PathBuf::from),
        },
        Some("export") => AppCommand::AliasExport,
        Some("backup") => AppCommand::AliasBackup,
        Some("restore") => AppCommand::AliasRestore {
            file: args.get(1).map(PathBuf::from),
        },
        Some(other) => AppCommand::Unknown(format!("未知的 alias 子命令: {}", other)),
    }
}

fn parse_backup(args: &[&str]) -> AppCommand {
    let id = args
        .iter()
        .skip(1)
        .find(|a| !a.starts_with("--"))
        .map(|s| s.to_string());
    let confirmed = has_flag(args, "--yes");
    match (args.first().copied(), id) {
        (Some("create"), _) => AppCommand::BackupCreate,
        (Some("list"), _) | (None, _) => AppCommand::BackupList,
        (Some("restore"), Some(id)) => AppCommand::BackupRestore {
            id,
            clear_existing: has_flag(args, "--clear"),
            confirmed,
        },
        (Some("delete"), Some(id)) => AppCommand::BackupDelete { id, confirmed },
        (Some("restore"), None) => {
            AppCommand::Unknown("用法: backup restore <id> [--clear] [--yes]".to_string())
        }
        (Some("delete"), None) => AppCommand::Unknown("用法: backup delete <id> [--yes]".to_string()),
        (Some(other), _) => AppCommand::Unknown(format!("未知的 backup 子命令: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> AppCommand {
        s.parse().unwrap()
    }

    #[test]
    fn tokenizer_keeps_quoted_values() {
        assert_eq!(
            tokenize(r#"search category="Skin Care" brand='Acme Co'  ingredient=Water"#),
            vec!["search", "category=Skin Care", "brand=Acme Co", "ingredient=Water"]
        );
        assert_eq!(tokenize(r#"alias add """#), vec!["alias", "add", ""]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn search_rows_and_facets() {
        let AppCommand::Search(filters) =
            parse("search ingredient=Water:10:20 ingredient=Glycerin::5 exclude=Ethanol exclude=#12 brand=Acme site=\"Plant 7\"")
        else {
            panic!("expected search");
        };
        assert_eq!(
            filters.ingredients,
            vec![
                IngredientFilter::between("Water", Some(10.0), Some(20.0)),
                IngredientFilter::between("Glycerin", None, Some(5.0)),
            ]
        );
        assert_eq!(filters.exclusions.len(), 2);
        assert_eq!(filters.exclusions[1].id, Some(12));
        assert_eq!(filters.facets.brand, "Acme");
        assert_eq!(filters.facets.production_site, "Plant 7");
    }

    #[test]
    fn bad_amount_is_reported() {
        assert!(matches!(parse("search ingredient=Water:abc"), AppCommand::Unknown(m) if m.contains("abc")));
        assert!(matches!(parse("search colour=red"), AppCommand::Unknown(_)));
    }

    #[test]
    fn destructive_commands_carry_confirmation() {
        assert_eq!(
            parse("alias delete 7"),
            AppCommand::AliasDelete {
                alias_id: 7,
                confirmed: false
            }
        );
        assert_eq!(
            parse("backup restore b-20240101 --clear --yes"),
            AppCommand::BackupRestore {
                id: "b-20240101".into(),
                clear_existing: true,
                confirmed: true
            }
        );
        assert_eq!(
            parse("backup delete --yes b1"),
            AppCommand::BackupDelete {
                id: "b1".into(),
                confirmed: true
            }
        );
    }

    #[test]
    fn misc_commands() {
        assert_eq!(parse("alias add   "), AppCommand::AliasAdd { text: String::new() });
        assert_eq!(
            parse("alias add \"Acetyl salicylic\""),
            AppCommand::AliasAdd {
                text: "Acetyl salicylic".into()
            }
        );
        assert_eq!(parse("alias import"), AppCommand::AliasImport { file: None });
        assert_eq!(parse("page 3"), AppCommand::Page(PageNav::To(3)));
        assert_eq!(parse("view card"), AppCommand::View(ViewMode::Card));
        assert_eq!(
            parse("formulas brand=Acme phase=Active"),
            AppCommand::Formulas(ListFilters {
                brand: "Acme".into(),
                category: String::new(),
                lifecycle_phase: "Active".into()
            })
        );
        assert_eq!(
            parse("ingredients find asp"),
            AppCommand::IngredientsType { term: "asp".into() }
        );
        assert_eq!(parse("db excel data.xlsx"), AppCommand::DbUploadExcel {
            file: Some(PathBuf::from("data.xlsx"))
        });
        assert_eq!(parse("q"), AppCommand::Quit);
        assert!(matches!(parse("frobnicate"), AppCommand::Unknown(_)));
    }
}

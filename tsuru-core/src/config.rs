//! 設定ファイルと `config` コマンド

use crate::context::CallContext;
use crate::errors::CommandError;
use crate::format::align_columns;
use crate::parse::split_command;
use crate::session::Session;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use tsuru_target::{LoadConfig, LONG_LOAD_CONFIG};

/// ソースパスの置換規則
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutePathRule {
    pub from: String,
    pub to: String,
}

/// ユーザー設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_string_len: Option<i32>,
    pub max_array_values: Option<i32>,
    /// `whatis` で変数の位置式も表示するか
    pub show_location_expr: bool,
    /// 正規名 → 追加の別名
    pub aliases: BTreeMap<String, Vec<String>>,
    pub substitute_path: Vec<SubstitutePathRule>,
}

impl Config {
    /// 既定の設定ファイルパス（`~/.config/tsuru/config.toml`）
    pub fn default_path() -> Option<PathBuf> {
        home::home_dir().map(|h| h.join(".config").join("tsuru").join("config.toml"))
    }

    /// 設定ファイルを読み込む
    ///
    /// ファイルが無ければ既定値を返します。
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text)
                .with_context(|| format!("failed to parse {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no configuration file");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// 設定ファイルに書き出す
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// 置換規則を適用する（最初に一致した規則のみ）
    pub fn substitute_path(&self, path: &str) -> String {
        for rule in &self.substitute_path {
            if let Some(rest) = path.strip_prefix(rule.from.as_str()) {
                return format!("{}{}", rule.to, rest);
            }
        }
        path.to_string()
    }

    /// 詳細表示用の読み込み設定
    pub fn long_load_config(&self) -> LoadConfig {
        let mut cfg = LONG_LOAD_CONFIG;
        if let Some(n) = self.max_string_len {
            cfg.max_string_len = n;
        }
        if let Some(n) = self.max_array_values {
            cfg.max_array_values = n;
        }
        cfg
    }

    /// パラメーターを1つ変更する
    pub fn set(&mut self, param: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match param.replace('-', "_").as_str() {
            "max_string_len" => self.max_string_len = parse_optional_int(value)?,
            "max_array_values" => self.max_array_values = parse_optional_int(value)?,
            "show_location_expr" => {
                self.show_location_expr = value
                    .parse::<bool>()
                    .map_err(|_| CommandError::usage(format!("invalid boolean: {}", value)))?;
            }
            _ => {
                return Err(CommandError::usage(format!("unknown configuration parameter {}", param)).into())
            }
        }
        Ok(())
    }

    fn write_list(&self, out: &mut dyn Write) -> Result<()> {
        let show = |v: Option<i32>| v.map(|n| n.to_string()).unwrap_or_else(|| "<not defined>".to_string());
        let mut rows = vec![
            vec!["max-string-len".to_string(), show(self.max_string_len)],
            vec!["max-array-values".to_string(), show(self.max_array_values)],
            vec!["show-location-expr".to_string(), self.show_location_expr.to_string()],
        ];
        for (name, aliases) in &self.aliases {
            rows.push(vec!["alias".to_string(), format!("{} = {}", name, aliases.join(", "))]);
        }
        for rule in &self.substitute_path {
            rows.push(vec![
                "substitute-path".to_string(),
                format!("{:?} → {:?}", rule.from, rule.to),
            ]);
        }
        write!(out, "{}", align_columns(&rows, 0, 2, ' '))?;
        Ok(())
    }
}

fn parse_optional_int(value: &str) -> Result<Option<i32>> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<i32>()
        .map(Some)
        .map_err(|_| CommandError::usage(format!("invalid number: {}", value)).into())
}

/// `config ...`
pub(crate) fn configure(s: &mut Session, _: &mut CallContext, args: &str) -> Result<()> {
    let (head, rest) = split_command(args);
    match head {
        "" => Err(CommandError::usage("wrong number of arguments to config").into()),
        "-list" => s.config.write_list(s.out.as_mut()),
        "-save" => {
            let path = s
                .config_path
                .clone()
                .or_else(Config::default_path)
                .ok_or_else(|| CommandError::usage("no configuration file path"))?;
            s.config.save(&path)?;
            writeln!(s.out, "Configuration saved to {}", path.display())?;
            Ok(())
        }
        "substitute-path" => configure_substitute_path(&mut s.config, rest),
        "alias" => configure_alias(s, rest),
        param => s.config.set(param, rest),
    }
}

fn configure_substitute_path(config: &mut Config, args: &str) -> Result<()> {
    let (from, to) = split_command(args);
    if from.is_empty() {
        return Err(CommandError::usage("wrong number of arguments to config substitute-path").into());
    }
    if to.is_empty() {
        let before = config.substitute_path.len();
        config.substitute_path.retain(|r| r.from != from);
        if config.substitute_path.len() == before {
            return Err(anyhow::anyhow!("could not find rule for {:?}", from));
        }
        return Ok(());
    }
    match config.substitute_path.iter_mut().find(|r| r.from == from) {
        Some(rule) => rule.to = to.to_string(),
        None => config.substitute_path.push(SubstitutePathRule {
            from: from.to_string(),
            to: to.to_string(),
        }),
    }
    Ok(())
}

fn configure_alias(s: &mut Session, args: &str) -> Result<()> {
    let (first, second) = split_command(args);
    match (first, second) {
        ("", _) => return Err(CommandError::usage("wrong number of arguments to config alias").into()),
        (alias, "") => {
            let mut found = false;
            for aliases in s.config.aliases.values_mut() {
                let before = aliases.len();
                aliases.retain(|a| a != alias);
                found |= aliases.len() != before;
            }
            s.config.aliases.retain(|_, v| !v.is_empty());
            if !found {
                return Err(anyhow::anyhow!("could not find command for alias {}", alias));
            }
        }
        (command, alias) => {
            let name = s
                .commands
                .get(command)
                .map(|c| c.name().to_string())
                .ok_or_else(|| anyhow::anyhow!("unknown command {}", command))?;
            if let Some(existing) = s.commands.get(alias) {
                return Err(anyhow::anyhow!("alias {} already used by {}", alias, existing.name()));
            }
            s.config.aliases.entry(name).or_default().push(alias.to_string());
        }
    }
    let aliases = s.config.aliases.clone();
    s.commands.merge(&aliases);
    Ok(())
}

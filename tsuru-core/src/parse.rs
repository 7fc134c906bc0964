//! パース関連のユーティリティ関数

use crate::errors::CommandError;
use crate::Result;
use tsuru_target::{LoadConfig, SHORT_LOAD_CONFIG};

/// 先頭トークンと残りに分割する
///
/// 残りは前後の空白を取り除いて返します。空なら空文字列です。
///
/// # Examples
/// ```
/// use tsuru_core::parse::split_command;
///
/// assert_eq!(split_command("  goroutine 3 next "), ("goroutine", "3 next"));
/// assert_eq!(split_command("next"), ("next", ""));
/// ```
pub fn split_command(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    }
}

/// 整数をパースする
///
/// 失敗した場合は入力を含む利用エラーを返します。
pub fn parse_int(s: &str) -> Result<i64> {
    s.trim().parse::<i64>().map_err(|_| {
        CommandError::usage(format!("invalid syntax: '{}' is not a number", s.trim())).into()
    })
}

/// アドレス文字列をu64にパース
///
/// 16進数（0xプレフィックス付き）、8進数（0プレフィックス付き）、10進数をサポート
///
/// # Examples
/// ```
/// use tsuru_core::parse::parse_address;
///
/// assert_eq!(parse_address("0x1234").unwrap(), 0x1234);
/// assert_eq!(parse_address("1234").unwrap(), 1234);
/// ```
pub fn parse_address(s: &str) -> Result<u64> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        u64::from_str_radix(&s[1..], 8)
    } else {
        s.parse::<u64>()
    };
    parsed.map_err(|_| {
        CommandError::usage(format!("wrong argument: {} is not a number", s)).into()
    })
}

/// `stack` コマンドの引数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackArgs {
    pub depth: i64,
    pub full: bool,
    pub offsets: bool,
}

impl Default for StackArgs {
    fn default() -> Self {
        Self {
            depth: 10,
            full: false,
            offsets: false,
        }
    }
}

/// `stack [<depth>] [-full] [-offsets]` をパースする
pub fn parse_stack_args(args: &str) -> Result<StackArgs> {
    let mut r = StackArgs::default();
    for arg in args.split_whitespace() {
        match arg {
            "-full" => r.full = true,
            "-offsets" => r.offsets = true,
            _ => {
                r.depth = arg
                    .parse::<i64>()
                    .map_err(|_| CommandError::usage("depth must be a number"))?;
            }
        }
    }
    Ok(r)
}

/// `[-v] [<regex>]` をパースする
///
/// `-v` があれば `long` を、無ければ一行表示用の設定を返します。
pub fn parse_var_arguments(args: &str, long: LoadConfig) -> (&str, LoadConfig) {
    let (head, rest) = split_command(args);
    if head == "-v" {
        return (rest, long);
    }
    (args.trim(), SHORT_LOAD_CONFIG)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsuru_target::LONG_LOAD_CONFIG;

    #[test]
    fn test_split_command() {
        assert_eq!(split_command(""), ("", ""));
        assert_eq!(split_command("on bp1   print x"), ("on", "bp1   print x"));
        assert_eq!(split_command("frame\t2 locals"), ("frame", "2 locals"));
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42").unwrap(), 42);
        assert_eq!(parse_int("-1").unwrap(), -1);
        assert!(parse_int("abc").is_err());
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x1234").unwrap(), 0x1234);
        assert_eq!(parse_address("0X1234").unwrap(), 0x1234);
        assert_eq!(parse_address("010").unwrap(), 8);
        assert_eq!(parse_address("4096").unwrap(), 4096);
        assert!(parse_address("xyz").is_err());
        assert!(parse_address("0xghij").is_err());
    }

    #[test]
    fn test_parse_stack_args() {
        assert_eq!(parse_stack_args("").unwrap(), StackArgs::default());
        let sa = parse_stack_args("5 -full -offsets").unwrap();
        assert_eq!(sa.depth, 5);
        assert!(sa.full);
        assert!(sa.offsets);
        assert!(parse_stack_args("deep").is_err());
    }

    #[test]
    fn test_parse_var_arguments() {
        let (filter, cfg) = parse_var_arguments("-v ^a", LONG_LOAD_CONFIG);
        assert_eq!(filter, "^a");
        assert_eq!(cfg, LONG_LOAD_CONFIG);

        let (filter, cfg) = parse_var_arguments("^b", LONG_LOAD_CONFIG);
        assert_eq!(filter, "^b");
        assert_eq!(cfg, SHORT_LOAD_CONFIG);

        let (filter, cfg) = parse_var_arguments("-v", LONG_LOAD_CONFIG);
        assert_eq!(filter, "");
        assert_eq!(cfg, LONG_LOAD_CONFIG);
    }
}

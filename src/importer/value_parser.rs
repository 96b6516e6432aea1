// ==========================================
// 尾程运价引擎 - 单元格取值解析
// ==========================================
// 职责: 重量段解析、价格解析、单元格内容特征判断
// 约定: 解析失败返回 None（行级丢弃/空价格），不产生错误
// ==========================================

use crate::domain::rate::OPEN_ENDED_WEIGHT;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::OnceLock;

const NUM: &str = r"(\d+(?:\.\d+)?)";

// 模式编译失败时对应写法视为不可识别（None），不 panic
fn range_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"^{NUM}(?:-|~|至|到){NUM}$")).ok())
        .as_ref()
}

fn up_to_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"^(?:upto|to|max|bis|<=|≤|<|至|不超过|小于等于){NUM}$|^{NUM}(?:以内|以下)$"
        ))
        .ok()
    })
    .as_ref()
}

fn over_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"^{NUM}(?:\+|以上)$|^(?:over|above|from|ab|>=|≥|>|超过|大于){NUM}$"
        ))
        .ok()
    })
    .as_ref()
}

fn zone_value_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:zone\s*\w{1,4}|z\d{1,3}|[a-z]{1,3}\d{0,3}|(?:分区|区域|区)\s*\w{1,4})$")
            .ok()
    })
    .as_ref()
}

/// 逗号后紧跟的数字位数
fn digits_after(chars: &[char], idx: usize) -> usize {
    chars[idx + 1..].iter().take_while(|c| c.is_ascii_digit()).count()
}

/// 重量文本中的逗号：后跟恰好 3 位数字视为千分位（去掉），否则视为小数点
fn normalize_weight_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    chars
        .iter()
        .enumerate()
        .filter_map(|(i, c)| match c {
            ',' if digits_after(&chars, i) == 3 => None,
            ',' => Some('.'),
            other => Some(*other),
        })
        .collect()
}

/// 整数部分是否为规范的千分位分组（首组 1-3 位，其余每组恰好 3 位，至少两组）
fn is_thousands_grouped(int_part: &str, sep: char) -> bool {
    let groups: Vec<&str> = int_part.split(sep).collect();
    groups.len() >= 2
        && groups.iter().all(|g| g.chars().all(|c| c.is_ascii_digit()))
        && (1..=3).contains(&groups[0].len())
        && groups[1..].iter().all(|g| g.len() == 3)
}

/// 价格数字的分隔符规范化
///
/// - "1,234.56" / "1,000"：逗号为千分位
/// - "1.234,56"：点为千分位、逗号为小数点
/// - "1,50" / "12,5"：逗号为小数点
/// - 其余含逗号的写法无法确定含义，返回 None
fn normalize_price_separators(s: &str) -> Option<String> {
    if !s.contains(',') {
        return Some(s.to_string());
    }
    let (sign, body) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s.strip_prefix('+').unwrap_or(s)),
    };

    let last_comma = body.rfind(',')?;
    match body.rfind('.') {
        Some(last_dot) if last_dot > last_comma => {
            let (int_part, frac) = body.split_at(last_dot);
            is_thousands_grouped(int_part, ',')
                .then(|| format!("{}{}{}", sign, int_part.replace(',', ""), frac))
        }
        Some(_) => {
            let (int_part, frac) = body.split_at(last_comma);
            let frac = &frac[1..];
            let valid = is_thousands_grouped(int_part, '.')
                && !frac.is_empty()
                && frac.chars().all(|c| c.is_ascii_digit());
            valid.then(|| format!("{}{}.{}", sign, int_part.replace('.', ""), frac))
        }
        None if is_thousands_grouped(body, ',') => Some(format!("{}{}", sign, body.replace(',', ""))),
        None => {
            let (int_part, frac) = body.split_at(last_comma);
            let frac = &frac[1..];
            let valid = !int_part.is_empty()
                && int_part.chars().all(|c| c.is_ascii_digit())
                && (1..=2).contains(&frac.len())
                && frac.chars().all(|c| c.is_ascii_digit());
            valid.then(|| format!("{}{}.{}", sign, int_part, frac))
        }
    }
}

/// 重量文本规范化：小写、去空白、处理千分位/小数逗号、统一分隔符、去单位
fn compact_weight_text(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let mut s: String = normalize_weight_commas(&compact)
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '–' | '—' | '－' => '-',
            '～' | '〜' => '~',
            other => other,
        })
        .collect();
    for unit in ["kgs", "kg", "公斤", "千克"] {
        s = s.replace(unit, "");
    }
    s
}

fn capture_number(caps: &regex::Captures<'_>) -> Option<f64> {
    caps.iter()
        .skip(1)
        .flatten()
        .next()
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// 解析重量段文本
///
/// # 支持
/// - "<from>-<to>" / "<from>~<to>"（可带 kg 后缀）→ (from, to)，要求 from ≤ to
/// - "up to N" / "≤N" / "N以内" → (0, N)
/// - "N+" / "over N" / "N以上" → (N, 9999)
///
/// # 返回
/// - None: 无法解析（该行在归一化阶段被丢弃）
pub fn parse_weight_range(raw: &str) -> Option<(f64, f64)> {
    let s = compact_weight_text(raw);
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = range_re().and_then(|re| re.captures(&s)) {
        let from = caps.get(1)?.as_str().parse::<f64>().ok()?;
        let to = caps.get(2)?.as_str().parse::<f64>().ok()?;
        return if from <= to { Some((from, to)) } else { None };
    }

    if let Some(caps) = up_to_re().and_then(|re| re.captures(&s)) {
        return capture_number(&caps).map(|n| (0.0, n));
    }

    if let Some(caps) = over_re().and_then(|re| re.captures(&s)) {
        return capture_number(&caps).map(|n| (n, OPEN_ENDED_WEIGHT.max(n)));
    }

    None
}

/// 解析单个重量值（list 版式的 from/to 列）
///
/// 空值、"max"、"+"、"∞" 等开放上限写法返回哨兵上界由调用方决定，
/// 这里只负责数值本身
pub fn parse_weight_value(raw: &str) -> Option<f64> {
    let s = compact_weight_text(raw);
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// 上界列中表示"无上限"的写法
pub fn is_open_upper_bound(raw: &str) -> bool {
    matches!(
        compact_weight_text(raw).as_str(),
        "+" | "max" | "∞" | "inf" | "open" | "以上" | "不限"
    )
}

/// 解析价格文本
///
/// 去除货币符号（€ $ ¥ £ ￥）、货币代码、千分位、"/kg" 后缀后按十进制解析；
/// 小数逗号（"1,50"）按小数点处理；失败返回 None（"无价格"）
pub fn parse_price(raw: &str) -> Option<Decimal> {
    let mut s: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '€' | '$' | '¥' | '£' | '￥' | '元') && !c.is_whitespace())
        .collect();
    if s.is_empty() {
        return None;
    }

    let lower = s.to_lowercase();
    if let Some(stripped) = lower.strip_suffix("/kg") {
        s = stripped.to_string();
    }
    for code in ["EUR", "USD", "CNY", "RMB", "GBP", "JPY", "eur", "usd", "cny", "rmb", "gbp", "jpy"] {
        if let Some(rest) = s.strip_prefix(code) {
            s = rest.to_string();
        } else if let Some(rest) = s.strip_suffix(code) {
            s = rest.to_string();
        }
    }

    let s = normalize_price_separators(&s)?;
    Decimal::from_str(&s).ok()
}

/// 价格单元格是否标注为每公斤单价
pub fn is_per_kg_price(raw: &str) -> bool {
    let lower = raw.to_lowercase().replace(' ', "");
    lower.contains("/kg") || lower.contains("每公斤") || lower.contains("/公斤")
}

/// 是否为数值单元格（可解析为价格）
pub fn is_numeric_value(raw: &str) -> bool {
    parse_price(raw).is_some()
}

/// 是否为重量段写法
pub fn is_weight_range_value(raw: &str) -> bool {
    parse_weight_range(raw).is_some()
}

/// 是否像分区代码（需含字母，纯数字视为数值）
pub fn is_zone_like_value(raw: &str) -> bool {
    let s = raw.trim();
    !s.is_empty() && s.chars().any(|c| !c.is_ascii_digit()) && zone_value_re().is_some_and(|re| re.is_match(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_weight_range_dash_and_tilde() {
        assert_eq!(parse_weight_range("0-5"), Some((0.0, 5.0)));
        assert_eq!(parse_weight_range("5~10"), Some((5.0, 10.0)));
        assert_eq!(parse_weight_range("0.5 - 1.5 kg"), Some((0.5, 1.5)));
        assert_eq!(parse_weight_range("10kg~20kg"), Some((10.0, 20.0)));
        assert_eq!(parse_weight_range("1–2"), Some((1.0, 2.0)));
    }

    #[test]
    fn test_parse_weight_range_rejects_descending() {
        assert_eq!(parse_weight_range("10-5"), None);
    }

    #[test]
    fn test_parse_weight_range_up_to() {
        assert_eq!(parse_weight_range("up to 5"), Some((0.0, 5.0)));
        assert_eq!(parse_weight_range("Up to 2.5 kg"), Some((0.0, 2.5)));
        assert_eq!(parse_weight_range("5kg以内"), Some((0.0, 5.0)));
        assert_eq!(parse_weight_range("≤ 3"), Some((0.0, 3.0)));
    }

    #[test]
    fn test_parse_weight_range_open_ended() {
        assert_eq!(parse_weight_range("5+"), Some((5.0, OPEN_ENDED_WEIGHT)));
        assert_eq!(parse_weight_range("over 30"), Some((30.0, OPEN_ENDED_WEIGHT)));
        assert_eq!(parse_weight_range("30kg以上"), Some((30.0, OPEN_ENDED_WEIGHT)));
    }

    #[test]
    fn test_parse_weight_range_unparseable() {
        assert_eq!(parse_weight_range(""), None);
        assert_eq!(parse_weight_range("heavy"), None);
        assert_eq!(parse_weight_range("5"), None);
    }

    #[test]
    fn test_parse_weight_range_property_over_grid() {
        for a in 0..20u32 {
            for b in a..(a + 15) {
                let (fa, fb) = (a as f64 / 2.0, b as f64 / 2.0);
                assert_eq!(parse_weight_range(&format!("{}-{}", fa, fb)), Some((fa, fb)));
                assert_eq!(parse_weight_range(&format!("{}~{}", fa, fb)), Some((fa, fb)));
            }
        }
    }

    #[test]
    fn test_parse_price_symbols_and_separators() {
        assert_eq!(parse_price("€1,234.56"), Some(dec!(1234.56)));
        assert_eq!(parse_price("$ 1,000"), Some(dec!(1000)));
        assert_eq!(parse_price("¥88"), Some(dec!(88)));
        assert_eq!(parse_price("£0.99"), Some(dec!(0.99)));
        assert_eq!(parse_price("12.50 EUR"), Some(dec!(12.50)));
        assert_eq!(parse_price("2.10/kg"), Some(dec!(2.10)));
        assert_eq!(parse_price("-3"), Some(dec!(-3)));
    }

    #[test]
    fn test_parse_price_decimal_comma() {
        assert_eq!(parse_price("1,50"), Some(dec!(1.50)));
        assert_eq!(parse_price("12,5"), Some(dec!(12.5)));
        assert_eq!(parse_price("€ 3,99"), Some(dec!(3.99)));
        assert_eq!(parse_price("1.234,56"), Some(dec!(1234.56)));
        assert_eq!(parse_price("-2,5"), Some(dec!(-2.5)));
        assert_eq!(parse_price("12,345,678.9"), Some(dec!(12345678.9)));
    }

    #[test]
    fn test_parse_price_ambiguous_commas_are_none() {
        assert_eq!(parse_price("1,2345"), None);
        assert_eq!(parse_price("12,34,5"), None);
        assert_eq!(parse_price("1,23.4"), None);
    }

    #[test]
    fn test_parse_weight_decimal_comma() {
        assert_eq!(parse_weight_range("0,5-1,5"), Some((0.5, 1.5)));
        assert_eq!(parse_weight_value("2,5"), Some(2.5));
        assert_eq!(parse_weight_value("1,000"), Some(1000.0));
    }

    #[test]
    fn test_patterns_compile() {
        assert!(range_re().is_some());
        assert!(up_to_re().is_some());
        assert!(over_re().is_some());
        assert!(zone_value_re().is_some());
    }

    #[test]
    fn test_parse_price_failure_is_none() {
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("n/a"), None);
        assert_eq!(parse_price("call us"), None);
    }

    #[test]
    fn test_value_features() {
        assert!(is_zone_like_value("A"));
        assert!(is_zone_like_value("Z3"));
        assert!(is_zone_like_value("Zone 4"));
        assert!(!is_zone_like_value("12"));
        assert!(!is_zone_like_value("0-5"));
        assert!(is_weight_range_value("0-5"));
        assert!(is_numeric_value("5.00"));
        assert!(is_per_kg_price("1.20 / kg"));
        assert!(is_open_upper_bound("MAX"));
    }
}

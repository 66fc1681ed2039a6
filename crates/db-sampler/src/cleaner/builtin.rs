//! Built-in field cleaners.

use chrono::{Days, NaiveDate, NaiveTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

use super::FieldCleaner;
use crate::core::{Row, SqlValue};
use crate::error::{Result, SamplerError};

const MIN_AGE_YEARS: u64 = 18;
const MAX_AGE_YEARS: u64 = 80;
const EMAIL_DOMAIN: &str = "example.invalid";
const EMAIL_HASH_LENGTH: usize = 12;

fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

fn parse_count(alias: &str, arg: &str) -> Result<usize> {
    match arg.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(SamplerError::Config(format!(
            "Cleaner '{}' expects a positive number, got '{}'",
            alias, arg
        ))),
    }
}

/// `null`: replace the value with NULL of the same type.
pub struct NullCleaner;

impl FieldCleaner for NullCleaner {
    fn clean(&self, value: &SqlValue, _row: &Row, _args: &[String]) -> Result<SqlValue> {
        Ok(value.to_null())
    }
}

/// `blank` / `empty`: replace the value with an empty string.
pub struct BlankCleaner;

impl FieldCleaner for BlankCleaner {
    fn clean(&self, _value: &SqlValue, _row: &Row, _args: &[String]) -> Result<SqlValue> {
        Ok(SqlValue::Text(String::new()))
    }
}

/// `zero`: replace the value with zero of the same numeric width.
pub struct ZeroCleaner;

impl FieldCleaner for ZeroCleaner {
    fn clean(&self, value: &SqlValue, _row: &Row, _args: &[String]) -> Result<SqlValue> {
        Ok(value.zero_like())
    }
}

/// `fixed:<text>`: replace the value with a literal. Colons in the literal
/// are kept.
pub struct FixedCleaner;

impl FieldCleaner for FixedCleaner {
    fn clean(&self, _value: &SqlValue, _row: &Row, args: &[String]) -> Result<SqlValue> {
        Ok(SqlValue::Text(args.join(":")))
    }

    fn check_args(&self, args: &[String]) -> Result<()> {
        if args.is_empty() {
            return Err(SamplerError::Config(
                "Cleaner 'fixed' needs a value, e.g. 'fixed:redacted'".into(),
            ));
        }
        Ok(())
    }
}

/// `hash[:<length>]`: hex SHA-256 digest of the value text, optionally
/// truncated.
pub struct HashCleaner;

impl FieldCleaner for HashCleaner {
    fn clean(&self, value: &SqlValue, _row: &Row, args: &[String]) -> Result<SqlValue> {
        let Some(text) = value.to_text() else {
            return Ok(value.clone());
        };
        let mut digest = sha256_hex(&text);
        if let Some(arg) = args.first() {
            digest.truncate(parse_count("hash", arg)?);
        }
        Ok(SqlValue::Text(digest))
    }

    fn check_args(&self, args: &[String]) -> Result<()> {
        match args.first() {
            Some(arg) => parse_count("hash", arg).map(|_| ()),
            None => Ok(()),
        }
    }
}

/// `email[:<domain>]`: deterministic placeholder address derived from the
/// original value, so equal inputs stay equal.
pub struct EmailCleaner;

impl FieldCleaner for EmailCleaner {
    fn clean(&self, value: &SqlValue, _row: &Row, args: &[String]) -> Result<SqlValue> {
        let Some(text) = value.to_text() else {
            return Ok(value.clone());
        };
        let domain = args
            .first()
            .map(String::as_str)
            .filter(|d| !d.is_empty())
            .unwrap_or(EMAIL_DOMAIN);
        let digest = sha256_hex(&text.to_lowercase());
        Ok(SqlValue::Text(format!(
            "user-{}@{}",
            &digest[..EMAIL_HASH_LENGTH],
            domain
        )))
    }
}

/// `randomdigits:<n>`: a string of `n` random decimal digits.
pub struct RandomDigitsCleaner;

impl FieldCleaner for RandomDigitsCleaner {
    fn clean(&self, value: &SqlValue, _row: &Row, args: &[String]) -> Result<SqlValue> {
        if value.is_null() {
            return Ok(value.clone());
        }
        let count = parse_count("randomdigits", args.first().map(String::as_str).unwrap_or(""))?;
        let mut rng = rand::thread_rng();
        let digits: String = (0..count)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();
        Ok(SqlValue::Text(digits))
    }

    fn check_args(&self, args: &[String]) -> Result<()> {
        parse_count("randomdigits", args.first().map(String::as_str).unwrap_or("")).map(|_| ())
    }
}

/// `dateofbirth`: a random date between 18 and 80 years ago, keeping the
/// temporal type of the original value.
pub struct DateOfBirthCleaner;

impl DateOfBirthCleaner {
    fn random_date() -> Result<NaiveDate> {
        let today = Utc::now().date_naive();
        let days = rand::thread_rng().gen_range(MIN_AGE_YEARS * 365..=MAX_AGE_YEARS * 365);
        today.checked_sub_days(Days::new(days)).ok_or_else(|| {
            SamplerError::Config(format!("Cannot compute a date {} days before {}", days, today))
        })
    }
}

impl FieldCleaner for DateOfBirthCleaner {
    fn clean(&self, value: &SqlValue, _row: &Row, _args: &[String]) -> Result<SqlValue> {
        if value.is_null() {
            return Ok(value.clone());
        }
        let date = Self::random_date()?;
        Ok(match value {
            SqlValue::DateTime(_) => SqlValue::DateTime(date.and_time(NaiveTime::MIN)),
            SqlValue::DateTimeOffset(original) => {
                match date.and_time(NaiveTime::MIN).and_local_timezone(*original.offset()) {
                    chrono::LocalResult::Single(dt) => SqlValue::DateTimeOffset(dt),
                    _ => SqlValue::Date(date),
                }
            }
            SqlValue::Text(_) => SqlValue::Text(date.format("%Y-%m-%d").to_string()),
            _ => SqlValue::Date(date),
        })
    }
}

/// `template:<format>`: render `{column}` placeholders from the row.
///
/// NULL fields render as empty text. `{{` and `}}` produce literal braces.
pub struct TemplateCleaner;

impl TemplateCleaner {
    fn render(template: &str, row: &Row) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut column = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => column.push(ch),
                            None => {
                                return Err(SamplerError::Config(format!(
                                    "Unterminated placeholder in template '{}'",
                                    template
                                )))
                            }
                        }
                    }
                    let value = row.get(&column).ok_or_else(|| {
                        SamplerError::Config(format!(
                            "Template '{}' references unknown column '{}'",
                            template, column
                        ))
                    })?;
                    out.push_str(&value.to_text().unwrap_or_default());
                }
                other => out.push(other),
            }
        }
        Ok(out)
    }
}

impl FieldCleaner for TemplateCleaner {
    fn clean(&self, _value: &SqlValue, row: &Row, args: &[String]) -> Result<SqlValue> {
        Ok(SqlValue::Text(Self::render(&args.join(":"), row)?))
    }

    fn check_args(&self, args: &[String]) -> Result<()> {
        if args.is_empty() {
            return Err(SamplerError::Config(
                "Cleaner 'template' needs a format, e.g. 'template:user{id}'".into(),
            ));
        }
        Ok(())
    }
}

/// `copy:<column>`: take the (possibly already cleaned) value of another
/// column.
pub struct CopyCleaner;

impl FieldCleaner for CopyCleaner {
    fn clean(&self, _value: &SqlValue, row: &Row, args: &[String]) -> Result<SqlValue> {
        let column = args.first().map(String::as_str).unwrap_or("");
        row.get(column).cloned().ok_or_else(|| {
            SamplerError::Config(format!("Column '{}' to copy from does not exist", column))
        })
    }

    fn check_args(&self, args: &[String]) -> Result<()> {
        match args {
            [column] if !column.is_empty() => Ok(()),
            _ => Err(SamplerError::Config(
                "Cleaner 'copy' needs exactly one column, e.g. 'copy:name'".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SqlNullType;
    use chrono::Datelike;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn row() -> Row {
        Row::new()
            .with("id", 42i64)
            .with("first", "Ada")
            .with("last", "Lovelace")
            .with("middle", SqlValue::Null(SqlNullType::String))
    }

    #[test]
    fn test_null_keeps_type_hint() {
        let cleaned = NullCleaner.clean(&SqlValue::I32(5), &row(), &[]).unwrap();
        assert_eq!(cleaned, SqlValue::Null(SqlNullType::I32));
    }

    #[test]
    fn test_blank_and_zero() {
        assert_eq!(
            BlankCleaner.clean(&SqlValue::Text("x".into()), &row(), &[]).unwrap(),
            SqlValue::Text(String::new())
        );
        assert_eq!(
            ZeroCleaner.clean(&SqlValue::I16(3), &row(), &[]).unwrap(),
            SqlValue::I16(0)
        );
    }

    #[test]
    fn test_fixed_keeps_colons() {
        let cleaned = FixedCleaner
            .clean(&SqlValue::Text("x".into()), &row(), &args(&["12", "00"]))
            .unwrap();
        assert_eq!(cleaned, SqlValue::Text("12:00".into()));
        assert!(FixedCleaner.check_args(&[]).is_err());
    }

    #[test]
    fn test_hash_is_deterministic_and_truncates() {
        let value = SqlValue::Text("secret".into());
        let full = HashCleaner.clean(&value, &row(), &[]).unwrap();
        assert_eq!(
            full,
            SqlValue::Text("2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b".into())
        );

        let short = HashCleaner.clean(&value, &row(), &args(&["8"])).unwrap();
        assert_eq!(short, SqlValue::Text("2bb80d53".into()));

        assert!(HashCleaner.check_args(&args(&["zero"])).is_err());
    }

    #[test]
    fn test_hash_and_email_keep_null() {
        let null = SqlValue::Null(SqlNullType::String);
        assert_eq!(HashCleaner.clean(&null, &row(), &[]).unwrap(), null);
        assert_eq!(EmailCleaner.clean(&null, &row(), &[]).unwrap(), null);
    }

    #[test]
    fn test_email_is_stable_per_input() {
        let a = EmailCleaner
            .clean(&SqlValue::Text("Ada@Example.com".into()), &row(), &[])
            .unwrap();
        let b = EmailCleaner
            .clean(&SqlValue::Text("ada@example.com".into()), &row(), &[])
            .unwrap();
        assert_eq!(a, b);

        let text = a.to_text().unwrap();
        assert!(text.starts_with("user-"));
        assert!(text.ends_with("@example.invalid"));
        assert_eq!(text.len(), "user-".len() + 12 + "@example.invalid".len());

        let custom = EmailCleaner
            .clean(&SqlValue::Text("x".into()), &row(), &args(&["test.local"]))
            .unwrap();
        assert!(custom.to_text().unwrap().ends_with("@test.local"));
    }

    #[test]
    fn test_random_digits() {
        let cleaned = RandomDigitsCleaner
            .clean(&SqlValue::Text("+44 20 7946".into()), &row(), &args(&["11"]))
            .unwrap();
        let text = cleaned.to_text().unwrap();
        assert_eq!(text.len(), 11);
        assert!(text.chars().all(|c| c.is_ascii_digit()));

        assert!(RandomDigitsCleaner.check_args(&[]).is_err());
        assert!(RandomDigitsCleaner.check_args(&args(&["0"])).is_err());
    }

    #[test]
    fn test_date_of_birth_range() {
        let today = Utc::now().date_naive();
        for _ in 0..50 {
            let cleaned = DateOfBirthCleaner
                .clean(&SqlValue::Date(today), &row(), &[])
                .unwrap();
            let SqlValue::Date(date) = cleaned else {
                panic!("expected a date, got {:?}", cleaned);
            };
            let age = today.year() - date.year();
            assert!((17..=81).contains(&age), "age {} out of range", age);
        }
    }

    #[test]
    fn test_date_of_birth_keeps_timestamp_type() {
        let original = SqlValue::DateTime(Utc::now().naive_utc());
        let cleaned = DateOfBirthCleaner.clean(&original, &row(), &[]).unwrap();
        assert!(matches!(cleaned, SqlValue::DateTime(_)));
    }

    #[test]
    fn test_template() {
        let cleaned = TemplateCleaner
            .clean(
                &SqlValue::Text("x".into()),
                &row(),
                &args(&["{first}.{last}-{id}{middle} {{ok}}"]),
            )
            .unwrap();
        assert_eq!(cleaned, SqlValue::Text("Ada.Lovelace-42 {ok}".into()));
    }

    #[test]
    fn test_template_unknown_column() {
        let err = TemplateCleaner
            .clean(&SqlValue::Text("x".into()), &row(), &args(&["{nickname}"]))
            .unwrap_err();
        assert!(err.to_string().contains("nickname"));
    }

    #[test]
    fn test_copy() {
        let cleaned = CopyCleaner
            .clean(&SqlValue::Text("x".into()), &row(), &args(&["first"]))
            .unwrap();
        assert_eq!(cleaned, SqlValue::Text("Ada".into()));
        assert!(CopyCleaner.check_args(&[]).is_err());
    }
}

//! Human-readable size parsing ("2K", "1.5G", "512 MB")

const SIZE_RANGES: &[(char, f64)] = &[
    ('Y', 1_208_925_819_614_629_174_706_176.0),
    ('Z', 1_180_591_620_717_411_303_424.0),
    ('E', 1_152_921_504_606_846_976.0),
    ('P', 1_125_899_906_842_624.0),
    ('T', 1_099_511_627_776.0),
    ('G', 1_073_741_824.0),
    ('M', 1_048_576.0),
    ('K', 1024.0),
    ('B', 1.0),
];

fn limit_for(key: char) -> Option<f64> {
    SIZE_RANGES
        .iter()
        .find(|(suffix, _)| *suffix == key)
        .map(|(_, limit)| *limit)
}

/// Convert a human-readable size into bytes (or bits).
///
/// `"2K"` is 2048; `human_to_bytes("10", Some("M"), false)` equals
/// `human_to_bytes("10M", None, false)`. A bare number with no unit and
/// no default unit is returned as-is.
pub fn human_to_bytes(input: &str, default_unit: Option<&str>, isbits: bool) -> Result<u64, String> {
    let text = input.trim_start();
    let num_end = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let num: f64 = text[..num_end]
        .parse()
        .map_err(|_| format!("can't interpret as a number: {input}"))?;

    let rest = text[num_end..].trim();
    let unit = if rest.is_empty() {
        default_unit
    } else if rest.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(rest)
    } else {
        return Err(format!("can't interpret size string: {input}"));
    };

    let Some(unit) = unit else {
        // No unit given, returning raw number
        return Ok(num.round() as u64);
    };

    let range_key = unit
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase())
        .ok_or_else(|| format!("empty unit in: {input}"))?;
    let limit = limit_for(range_key).ok_or_else(|| {
        let suffixes: Vec<String> = SIZE_RANGES.iter().map(|(s, _)| s.to_string()).collect();
        format!(
            "failed to convert {input} (unit = {unit}). The suffix must be one of {}",
            suffixes.join(", ")
        )
    })?;

    let (unit_class, unit_class_name) = if isbits { ('b', "bit") } else { ('B', "byte") };
    if unit.len() > 1
        && !unit.to_lowercase().contains(unit_class_name)
        && unit.chars().nth(1) != Some(unit_class)
    {
        let expect = if range_key == 'B' {
            format!("expect {unit_class} or {unit_class_name}")
        } else {
            format!("expect {range_key}{unit_class} or {range_key}")
        };
        return Err(format!(
            "failed to convert {input}. Value is not a valid string ({expect})"
        ));
    }

    Ok((num * limit).round() as u64)
}

/// Render a byte (or bit) count for humans: `2048` becomes `"2.00 KB"`.
pub fn bytes_to_human(size: f64, isbits: bool, unit: Option<&str>) -> String {
    let base = if isbits { "bits" } else { "Bytes" };

    let mut chosen = ('B', 1.0);
    for (suffix, limit) in SIZE_RANGES {
        let by_size = unit.is_none() && size >= *limit;
        let by_unit = unit
            .and_then(|u| u.chars().next())
            .is_some_and(|c| c.to_ascii_uppercase() == *suffix);
        if by_size || by_unit {
            chosen = (*suffix, *limit);
            break;
        }
    }

    let (suffix, limit) = chosen;
    let label = if (limit - 1.0).abs() < f64::EPSILON {
        base.to_string()
    } else {
        format!("{suffix}{}", &base[..1])
    };
    format!("{:.2} {label}", size / limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_units() {
        assert_eq!(human_to_bytes("2K", None, false).unwrap(), 2048);
        assert_eq!(human_to_bytes("10M", None, false).unwrap(), 10 * 1_048_576);
        assert_eq!(human_to_bytes("1.5G", None, false).unwrap(), 1_610_612_736);
    }

    #[test]
    fn test_default_unit_equivalence() {
        assert_eq!(
            human_to_bytes("10", Some("M"), false).unwrap(),
            human_to_bytes("10M", None, false).unwrap()
        );
    }

    #[test]
    fn test_bare_number() {
        assert_eq!(human_to_bytes("42", None, false).unwrap(), 42);
    }

    #[test]
    fn test_bits_class_mismatch() {
        assert!(human_to_bytes("10MB", None, true).is_err());
        assert!(human_to_bytes("10Mb", None, true).is_ok());
    }

    #[test]
    fn test_bad_suffix() {
        assert!(human_to_bytes("10Q", None, false).is_err());
        assert!(human_to_bytes("flurb", None, false).is_err());
    }

    #[test]
    fn test_bytes_to_human() {
        assert_eq!(bytes_to_human(2048.0, false, None), "2.00 KB");
        assert_eq!(bytes_to_human(512.0, false, None), "512.00 Bytes");
        assert_eq!(bytes_to_human(1_048_576.0, false, Some("K")), "1024.00 KB");
    }
}

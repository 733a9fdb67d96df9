//! Unit expressions and the (factor, offset) conversion pair.
//!
//! A unit string such as `"lb/ft2"` or `"Btu/ft/s"` is parsed into a map from
//! base dimension to exponent plus a scale into SI-ish base units. Two units
//! convert iff their dimension maps agree. Temperature units additionally
//! carry an offset and may only appear alone.
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    #[error("Unknown unit '{0}'")]
    Unknown(String),
    #[error("Malformed unit expression '{0}'")]
    Malformed(String),
    #[error("Cannot convert '{from}' to '{to}'")]
    Incompatible { from: String, to: String },
}

/// `display = offset + factor * native`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub factor: f64,
    pub offset: f64,
}

impl Conversion {
    pub const IDENTITY: Conversion = Conversion { factor: 1.0, offset: 0.0 };

    #[inline]
    pub fn apply(&self, native: f64) -> f64 { self.offset + self.factor * native }

    #[inline]
    pub fn invert(&self, display: f64) -> f64 { (display - self.offset) / self.factor }
}

impl Default for Conversion {
    fn default() -> Self { Self::IDENTITY }
}

/// (dimension, scale to base, offset to base)
fn base_unit(symbol: &str) -> Option<(&'static str, f64, f64)> {
    let entry = match symbol {
        // Length (m)
        "m" => ("length", 1.0, 0.0),
        "cm" => ("length", 0.01, 0.0),
        "mm" => ("length", 0.001, 0.0),
        "km" => ("length", 1000.0, 0.0),
        "in" => ("length", 0.0254, 0.0),
        "ft" => ("length", 0.3048, 0.0),
        "ch" => ("length", 20.1168, 0.0),
        "mi" => ("length", 1609.344, 0.0),
        // Area (m^2)
        "ac" => ("length^2", 4046.856_422_4, 0.0),
        "ha" => ("length^2", 10_000.0, 0.0),
        // Time (s)
        "s" => ("time", 1.0, 0.0),
        "min" => ("time", 60.0, 0.0),
        "h" => ("time", 3600.0, 0.0),
        "day" => ("time", 86_400.0, 0.0),
        // Mass (kg)
        "kg" => ("mass", 1.0, 0.0),
        "g" => ("mass", 0.001, 0.0),
        "lb" => ("mass", 0.453_592_37, 0.0),
        "oz" => ("mass", 0.028_349_523_125, 0.0),
        "ton" | "tons" => ("mass", 907.184_74, 0.0),
        "tonne" | "tonnes" => ("mass", 1000.0, 0.0),
        // Energy (J) and power (J/s)
        "J" => ("energy", 1.0, 0.0),
        "kJ" => ("energy", 1000.0, 0.0),
        "MJ" => ("energy", 1.0e6, 0.0),
        "Btu" => ("energy", 1055.055_852_62, 0.0),
        "cal" => ("energy", 4.1868, 0.0),
        "kcal" => ("energy", 4186.8, 0.0),
        "W" => ("power", 1.0, 0.0),
        "kW" => ("power", 1000.0, 0.0),
        // Temperature (K)
        "K" => ("temperature", 1.0, 0.0),
        "oC" => ("temperature", 1.0, 273.15),
        "oF" => ("temperature", 5.0 / 9.0, 459.67 * 5.0 / 9.0),
        // Angle (deg)
        "deg" => ("angle", 1.0, 0.0),
        "rad" => ("angle", 180.0 / std::f64::consts::PI, 0.0),
        // Dimensionless
        "fraction" | "ratio" | "dl" => ("", 1.0, 0.0),
        "%" => ("", 0.01, 0.0),
        _ => return None,
    };
    Some(entry)
}

/// A parsed unit: dimension exponents plus an affine map into base units.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUnit {
    terms: BTreeMap<String, i32>,
    scale: f64,
    offset: f64,
}

impl Default for ParsedUnit {
    fn default() -> Self { Self { terms: BTreeMap::new(), scale: 1.0, offset: 0.0 } }
}

impl ParsedUnit {
    /// Parses a unit expression. The empty string is dimensionless.
    pub fn parse(s: &str) -> Result<Self, UnitError> {
        let s = s.trim();
        let mut unit = ParsedUnit::default();
        if s.is_empty() {
            return Ok(unit);
        }

        // Lone symbols first, so affine units (temperatures) keep their offset.
        if let Some((dim, scale, offset)) = base_unit(s) {
            unit.add_dimension(dim, 1);
            unit.scale = scale;
            unit.offset = offset;
            return Ok(unit);
        }

        // Everything after the first '/' is in the denominator: "Btu/ft/s".
        for (i, part) in s.split('/').enumerate() {
            let sign = if i == 0 { 1 } else { -1 };
            unit.parse_product(part, sign, s)?;
        }
        Ok(unit)
    }

    fn parse_product(&mut self, product: &str, sign: i32, whole: &str) -> Result<(), UnitError> {
        let product = product.trim();
        if product == "1" {
            return Ok(());
        }
        if product.is_empty() {
            return Err(UnitError::Malformed(whole.to_string()));
        }
        for factor in product.split('*') {
            let factor = factor.trim();
            let (base, exp) = match factor.split_once('^') {
                Some((b, e)) => {
                    let exp = e.trim().parse::<i32>().map_err(|_| UnitError::Malformed(whole.to_string()))?;
                    (b.trim(), exp)
                }
                // Trailing digits are an exponent: "ft2", "m3".
                None => {
                    let split = factor.trim_end_matches(|c: char| c.is_ascii_digit()).len();
                    let (b, digits) = factor.split_at(split);
                    let exp = if digits.is_empty() {
                        1
                    } else {
                        digits.parse::<i32>().map_err(|_| UnitError::Malformed(whole.to_string()))?
                    };
                    (b, exp)
                }
            };
            if base.is_empty() {
                return Err(UnitError::Malformed(whole.to_string()));
            }
            let (dim, scale, offset) = base_unit(base).ok_or_else(|| UnitError::Unknown(base.to_string()))?;
            if offset != 0.0 {
                // Affine units cannot be composed.
                return Err(UnitError::Malformed(whole.to_string()));
            }
            self.add_dimension(dim, exp * sign);
            self.scale *= scale.powi(exp * sign);
        }
        Ok(())
    }

    fn add_dimension(&mut self, dim: &str, exp: i32) {
        if dim.is_empty() {
            return;
        }
        // Compound dimensions such as "length^2" fold into their base.
        let (base, power) = match dim.split_once('^') {
            Some((b, p)) => (b, p.parse::<i32>().unwrap_or(1)),
            None => (dim, 1),
        };
        let entry = self.terms.entry(base.to_string()).or_insert(0);
        *entry += exp * power;
        if *entry == 0 {
            self.terms.remove(base);
        }
    }

    /// Merges another unit into this one, multiplying them.
    pub fn multiply_by(&mut self, other: &Self) {
        for (base, exp) in &other.terms {
            self.add_dimension(base, *exp);
        }
        self.scale *= other.scale;
    }

    /// Merges another unit into this one, dividing by it.
    pub fn divide_by(&mut self, other: &Self) {
        for (base, exp) in &other.terms {
            self.add_dimension(base, -*exp);
        }
        self.scale /= other.scale;
    }

    pub fn is_dimensionless(&self) -> bool { self.terms.is_empty() }

    /// Canonical dimension signature, e.g. `"mass/length^2"`.
    pub fn dimension(&self) -> String {
        let (num, den): (Vec<_>, Vec<_>) = self.terms.iter().partition(|&(_, &v)| v > 0);

        let fmt = |terms: Vec<(&String, &i32)>| -> String {
            if terms.is_empty() { return "1".to_string(); }
            terms.into_iter()
                .map(|(k, v)| if v.abs() == 1 { k.clone() } else { format!("{}^{}", k, v.abs()) })
                .collect::<Vec<_>>()
                .join("*")
        };

        let n_str = fmt(num);
        let d_str = fmt(den);
        if d_str == "1" { n_str } else { format!("{}/{}", n_str, d_str) }
    }
}

/// Returns the conversion pair taking a value in `from` units into `to` units.
pub fn conversion(from: &str, to: &str) -> Result<Conversion, UnitError> {
    if from.trim() == to.trim() {
        return Ok(Conversion::IDENTITY);
    }
    let f = ParsedUnit::parse(from)?;
    let t = ParsedUnit::parse(to)?;
    if f.terms != t.terms {
        return Err(UnitError::Incompatible { from: from.to_string(), to: to.to_string() });
    }
    // base = scale * u + offset, for both sides.
    Ok(Conversion {
        factor: f.scale / t.scale,
        offset: (f.offset - t.offset) / t.scale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn close(a: f64, b: f64) -> bool { (a - b).abs() < 1e-9 * (1.0 + b.abs()) }

    #[rstest]
    #[case("ft", "length")]
    #[case("ft/min", "length/time")]
    #[case("lb/ft2", "mass/length^2")]
    #[case("tons/ac", "mass/length^2")]
    #[case("Btu/ft/s", "energy/length*time")]
    #[case("ft2/ft3", "1/length")]
    #[case("1/ft", "1/length")]
    #[case("%", "1")]
    #[case("", "1")]
    fn test_dimension_signature(#[case] input: &str, #[case] expected: &str) {
        let parsed = ParsedUnit::parse(input).unwrap();
        assert_eq!(parsed.dimension(), expected);
    }

    #[rstest]
    #[case("ft", "m", 10.0, 3.048)]
    #[case("ft/min", "ch/h", 66.0, 60.0)]
    #[case("mi/h", "ft/min", 1.0, 88.0)]
    #[case("oF", "oC", 212.0, 100.0)]
    #[case("oC", "oF", -40.0, -40.0)]
    #[case("fraction", "%", 0.25, 25.0)]
    #[case("tons/ac", "lb/ft2", 1.0, 2000.0 / 43560.0)]
    fn test_conversions(#[case] from: &str, #[case] to: &str, #[case] x: f64, #[case] y: f64) {
        let c = conversion(from, to).unwrap();
        assert!(close(c.apply(x), y), "{} {} -> {} {}, got {}", x, from, y, to, c.apply(x));
        assert!(close(c.invert(y), x));
    }

    #[test]
    fn test_incompatible_and_malformed() {
        assert!(matches!(conversion("ft", "lb"), Err(UnitError::Incompatible { .. })));
        assert!(matches!(conversion("furlong", "ft"), Err(UnitError::Unknown(_))));
        assert!(matches!(ParsedUnit::parse("oF/h"), Err(UnitError::Malformed(_))));
        assert!(matches!(ParsedUnit::parse("ft//s"), Err(UnitError::Malformed(_))));
        assert!(matches!(ParsedUnit::parse("ft^x"), Err(UnitError::Malformed(_))));
    }

    #[test]
    fn test_arithmetic() {
        // (lb / ft2) * ft2 = lb
        let mut load = ParsedUnit::parse("lb/ft2").unwrap();
        let area = ParsedUnit::parse("ft2").unwrap();
        load.multiply_by(&area);
        assert_eq!(load.dimension(), "mass");
        load.divide_by(&ParsedUnit::parse("lb").unwrap());
        assert!(load.is_dimensionless());
        assert!(close(load.scale, 1.0));
    }
}

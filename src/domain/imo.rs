// ==========================================
// 港口靠泊管理 - IMO 船舶识别号
// ==========================================
// 规则: 7 位数字,前 6 位按权重 7..2 加权求和,
//       和 mod 10 必须等于第 7 位 (校验位)
// ==========================================

use crate::domain::error::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const IMO_LENGTH: usize = 7;
const CHECKSUM_WEIGHTS: [u32; 6] = [7, 6, 5, 4, 3, 2];

/// IMO 船舶识别号 (值对象,构造即校验)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImoNumber(String);

impl ImoNumber {
    /// 解析并校验 IMO 号
    ///
    /// # 错误
    /// - `DomainError::Validation`: 长度不是 7 位、含非数字字符、校验位不符
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(DomainError::validation("IMO number is required."));
        }
        if value.len() != IMO_LENGTH || !value.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::validation(format!(
                "Invalid IMO number format: '{}'. An IMO number must be exactly 7 digits.",
                value
            )));
        }

        let digits: Vec<u32> = value.chars().filter_map(|c| c.to_digit(10)).collect();
        let expected = Self::check_digit(&digits[..6]);
        let actual = digits[6];
        if expected != actual {
            return Err(DomainError::validation(format!(
                "Invalid IMO check digit: expected {}, but got {}",
                expected, actual
            )));
        }

        Ok(Self(value.to_string()))
    }

    /// 计算校验位
    fn check_digit(first_six: &[u32]) -> u32 {
        first_six
            .iter()
            .zip(CHECKSUM_WEIGHTS.iter())
            .map(|(d, w)| d * w)
            .sum::<u32>()
            % 10
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImoNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ImoNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ImoNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ImoNumber> for String {
    fn from(imo: ImoNumber) -> Self {
        imo.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_imo() {
        let imo = ImoNumber::parse("9074729").unwrap();
        assert_eq!(imo.as_str(), "9074729");
        assert_eq!(imo.to_string(), "9074729");
    }

    #[test]
    fn test_invalid_check_digit() {
        let err = ImoNumber::parse("9074728").unwrap_err();
        assert_eq!(
            err,
            DomainError::Validation("Invalid IMO check digit: expected 9, but got 8".to_string())
        );
    }

    #[test]
    fn test_invalid_format() {
        assert!(ImoNumber::parse("").unwrap_err().is_validation());
        assert!(ImoNumber::parse("907472").is_err());
        assert!(ImoNumber::parse("90747290").is_err());
        assert!(ImoNumber::parse("90747a9").is_err());
    }

    #[test]
    fn test_surrounding_whitespace_is_trimmed() {
        let imo = ImoNumber::parse("  9074729 ").unwrap();
        assert_eq!(imo.as_str(), "9074729");
    }

    #[test]
    fn test_serde_rejects_bad_checksum() {
        let ok: ImoNumber = serde_json::from_str("\"9074729\"").unwrap();
        assert_eq!(ok.as_str(), "9074729");
        assert!(serde_json::from_str::<ImoNumber>("\"9074728\"").is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            .. ProptestConfig::default()
        })]

        /// 任意 7 位数字串: 构造成功 当且仅当 校验位正确
        #[test]
        fn property_checksum_decides_validity(digits in proptest::collection::vec(0u32..10, 7)) {
            let raw: String = digits.iter().map(|d| char::from_digit(*d, 10).unwrap()).collect();
            let weighted: u32 = digits[..6].iter().zip([7u32, 6, 5, 4, 3, 2]).map(|(d, w)| d * w).sum();
            let valid = weighted % 10 == digits[6];
            prop_assert_eq!(ImoNumber::parse(&raw).is_ok(), valid);
        }
    }
}

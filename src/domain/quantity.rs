// ==========================================
// 设备维保系统 - 十进制数量
// ==========================================
// 库存与领用数量按千分位整数保存和比较
// 红线: 库存扣减不使用浮点减法
// ==========================================

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Sub;

/// 数量（千分位定点数）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(i64);

impl Quantity {
    /// 每个单位的千分位数
    pub const SCALE: i64 = 1000;
    pub const ZERO: Quantity = Quantity(0);

    // 超过该量级后 f64 无法精确表示千分位
    const MAX_ABS_SCALED: f64 = 9.0e15;

    pub const fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    pub const fn milli(self) -> i64 {
        self.0
    }

    pub const fn whole(units: i64) -> Self {
        Quantity(units * Self::SCALE)
    }

    /// 从调用方传入的浮点数量换算
    ///
    /// # 返回
    /// - None: 非有限值、超过三位小数或超出范围
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = value * Self::SCALE as f64;
        let rounded = scaled.round();
        if rounded.abs() >= Self::MAX_ABS_SCALED || (scaled - rounded).abs() > 1e-6 {
            return None;
        }
        Some(Quantity(rounded as i64))
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// 是否为整数个单位
    pub fn is_whole(self) -> bool {
        self.0 % Self::SCALE == 0
    }
}

impl Sub for Quantity {
    type Output = Quantity;

    fn sub(self, other: Quantity) -> Quantity {
        Quantity(self.0 - other.0)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let units = abs / Self::SCALE as u64;
        let frac = abs % Self::SCALE as u64;
        if frac == 0 {
            write!(f, "{}{}", sign, units)
        } else {
            let digits = format!("{:03}", frac);
            write!(f, "{}{}.{}", sign, units, digits.trim_end_matches('0'))
        }
    }
}

// JSON 中按普通数字读写
impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Quantity::from_f64(value)
            .ok_or_else(|| D::Error::custom(format!("数量 {} 最多保留三位小数", value)))
    }
}

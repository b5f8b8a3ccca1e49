use std::cmp::Ordering;
use std::str::FromStr;

use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;
use dbz_core::{Number, Value};
use proptest::prelude::*;

/// Values that have several lossless or near-lossless representations.
fn base() -> impl Strategy<Value = f64> {
    prop_oneof![
        (-64i32..64).prop_map(f64::from),
        (-64i32..64).prop_map(|n| f64::from(n) / 8.0),
        prop::sample::select(vec![
            0.1,
            -0.1,
            0.3,
            -0.0,
            1.0e16,
            9_007_199_254_740_993.0,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NAN,
        ]),
    ]
}

fn number() -> impl Strategy<Value = Number> {
    (base(), 0u8..6, -2i64..3).prop_map(|(x, repr, nudge)| match repr {
        0 => Number::Float(x as f32),
        1 => Number::Double(x),
        2 if x.is_finite() => {
            Number::Decimal(BigDecimal::from_str(&x.to_string()).unwrap_or_default())
        }
        3 if x.is_finite() && x.fract() == 0.0 && x.abs() < 1.0e15 => Number::Int(x as i32),
        4 if x.is_finite() && x.fract() == 0.0 && x.abs() < 1.0e17 => {
            Number::Long(x as i64 + nudge)
        }
        5 if x.is_finite() && x.fract() == 0.0 => {
            Number::BigInt(BigInt::from(x as i64) + nudge)
        }
        _ => Number::Double(x),
    })
}

proptest! {
    #[test]
    fn comparison_is_antisymmetric(a in number(), b in number()) {
        prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
        prop_assert_eq!(a == b, a.cmp(&b) == Ordering::Equal);
    }

    #[test]
    fn comparison_is_transitive(a in number(), b in number(), c in number()) {
        if a <= b && b <= c {
            prop_assert!(a <= c, "{:?} <= {:?} <= {:?}", a, b, c);
        }
        if a == b && b == c {
            prop_assert_eq!(&a, &c);
        }
    }

    #[test]
    fn values_order_like_their_numbers(a in number(), b in number()) {
        prop_assert_eq!(Value::from(a.clone()).cmp(&Value::from(b.clone())), a.cmp(&b));
    }
}

#[test]
fn equal_numbers_in_different_forms() {
    let half = [
        Number::Float(0.5),
        Number::Double(0.5),
        Number::Decimal(BigDecimal::from_str("0.50").unwrap()),
    ];
    for a in &half {
        for b in &half {
            assert_eq!(a, b);
        }
    }
    assert_eq!(Number::Double(-0.0), Number::Long(0));
}

use deepbrot_core::{ComplexPoint, FixedPoint};

#[test]
fn f64_round_trip_keeps_eight_digits() {
    let values = [1.0, -1.0, 0.1, -2.718281828459045, 1.0e-6, 123_456.789, -3.5e-5];
    for &scale in &[60u32, 64, 100, 256, 1100] {
        for &x in &values {
            let back = FixedPoint::from_f64(x, scale).to_f64();
            let rel = ((back - x) / x).abs();
            assert!(rel < 1e-8, "{x} at scale {scale} came back as {back}");
        }
    }
}

#[test]
fn bit_length_is_floor_log2() {
    let cases: [(f64, i64); 10] = [
        (1.0, 0),
        (-1.0, 0),
        (2.0, 1),
        (-2.0, 1),
        (13.0, 3),
        (-13.0, 3),
        (8_792_364.0, 23),
        (-8_792_364.0, 23),
        (1e300, 996),
        (1e-300, -997),
    ];
    for (x, expected) in cases {
        let fx = FixedPoint::from_f64(x, 1100);
        assert_eq!(fx.bit_length(), expected, "bit_length({x})");
    }
    assert_eq!(FixedPoint::zero(1100).bit_length(), 0);
}

#[test]
fn tiny_values_keep_their_significand() {
    let fx = FixedPoint::from_f64(1e-300, 1100);
    assert_eq!(fx.to_f64(), 1e-300);
    assert_eq!(fx.to_ext().to_f64(), 1e-300);
}

#[test]
fn divide_undoes_multiply() {
    let pairs = [(0.1, 3.7), (1.0 / 3.0, 1.25), (12.5, 7.0), (1e-20, 1e10)];
    for &scale in &[64u32, 128, 400] {
        for &(a, b) in &pairs {
            let a = FixedPoint::from_f64(a, scale);
            let b = FixedPoint::from_f64(b, scale);
            let back = a.multiply(&b).divide(&b);
            let diff = back.subtract(&a);
            let one_ulp = FixedPoint::from_mantissa(1.into(), scale);
            let neg_ulp = FixedPoint::from_mantissa((-1).into(), scale);
            assert!(
                neg_ulp.leq(&diff) && diff.leq(&one_ulp),
                "{a} * {b} / {b} = {back}"
            );
        }
    }
}

#[test]
fn json_uses_decimal_mantissa() {
    let fx = FixedPoint::from_f64(-1.5, 1);
    let json = serde_json::to_string(&fx).unwrap();
    assert_eq!(json, r#"{"mantissa":"-3","scale":1}"#);

    let big: FixedPoint =
        serde_json::from_str(r#"{"mantissa":"123456789012345678901234567890","scale":90}"#)
            .unwrap();
    assert_eq!(big.scale(), 90);
    assert_eq!(big.mantissa().to_string(), "123456789012345678901234567890");

    let point = ComplexPoint::from_f64(0.25, -0.75, 8);
    let json = serde_json::to_string(&point).unwrap();
    let back: ComplexPoint = serde_json::from_str(&json).unwrap();
    assert_eq!(back, point);
}

#[test]
fn decimal_coordinates_survive_deep_scales() {
    let re = "-1.7490930718831265872154236047451984692793155670020357862346573";
    let fx = FixedPoint::from_decimal_str(re, 256).unwrap();
    assert!(fx.to_decimal_string().starts_with("-1.74909307188312658721542360474519846927"));
}

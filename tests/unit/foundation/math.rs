use super::*;

#[test]
fn fnv_seeded_hash_is_stable() {
    let mut a = Fnv1a64::new_default();
    a.write_bytes(b"fixpaint");
    let mut b = Fnv1a64::new(Fnv1a64::OFFSET_BASIS);
    b.write_bytes(b"fix");
    b.write_bytes(b"paint");
    assert_eq!(a.finish(), b.finish());

    let mut c = Fnv1a64::new_default();
    c.write_u32(0xff00_00ff);
    assert_ne!(c.finish(), Fnv1a64::new_default().finish());
}

#[test]
fn mul_div255_rounds() {
    assert_eq!(mul_div255(255, 255), 255);
    assert_eq!(mul_div255(0, 255), 0);
    assert_eq!(mul_div255(128, 255), 128);
    assert_eq!(mul_div255(255, 128), 128);
    assert_eq!(mul_div255(100, 128), 50);
}

#[test]
fn premultiply_handles_extremes() {
    assert_eq!(premultiply(0x00ff_ffff), 0);
    assert_eq!(premultiply(0xff12_3456), 0xff12_3456);
    assert_eq!(premultiply(0x80ff_0000), 0x8080_0000);
}

#[test]
fn unpremultiply_recovers_straight_color() {
    assert_eq!(unpremultiply(0x8080_0000), 0x80ff_0000);
    assert_eq!(unpremultiply(0), 0);
    assert_eq!(unpremultiply(0xff01_0203), 0xff01_0203);
}

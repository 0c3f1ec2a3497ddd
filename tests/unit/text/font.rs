use super::*;

fn tiny_font() -> BitmapFont {
    // Glyphs 'A'..='C' with widths 2, 0 and 3.
    BitmapFont::new(RasterBuffer::new(5, 4), 'A', 'C', vec![0, 2, 2, 5], 1).unwrap()
}

#[test]
fn builtin_font_is_uppercase_only() {
    let f = builtin_font();
    assert!(f.is_uppercase_only());
    assert_eq!(f.height(), 5);
    assert_eq!(f.glyph_index('a'), f.glyph_index('A'));
    assert!(f.can_display('q'));
    assert!(!f.can_display('~'));
    // Unknown characters fall back to the last glyph.
    assert_eq!(f.glyph_index('~'), f.glyph_index('Z'));
}

#[test]
fn builtin_glyph_bits_land_in_the_strip() {
    let f = builtin_font();
    let (x, w) = f.glyph_span(f.glyph_index('I'));
    assert_eq!(w, 3);
    let strip = f.strip();
    // 'I' is a full top bar and a centered stem.
    for col in 0..3 {
        assert_eq!(strip.get_pixel(x + col, 0), Some(0xffff_ffff));
    }
    assert_eq!(strip.get_pixel(x, 2), Some(0));
    assert_eq!(strip.get_pixel(x + 1, 2), Some(0xffff_ffff));

    let (sx, _) = f.glyph_span(f.glyph_index(' '));
    assert!((0..5).all(|row| (0..3).all(|col| strip.get_pixel(sx + col, row) == Some(0))));
}

#[test]
fn string_width_includes_tracking_between_glyphs() {
    let f = builtin_font();
    assert_eq!(f.string_width(""), 0);
    assert_eq!(f.string_width("A"), 3);
    assert_eq!(f.string_width("AB"), 7);
    assert_eq!(f.string_width("hello"), 5 * 3 + 4);
    assert_eq!(f.char_width('x'), 3);
}

#[test]
fn kerning_tables_add_to_the_advance() {
    let f = tiny_font().with_kerning(vec![0, 0, -1], vec![2, 0, 0]).unwrap();
    // right(A) + tracking + left(C)
    assert_eq!(f.kerning(0, 2), 2 + 1 - 1);
    assert_eq!(f.string_width("AC"), 2 + 2 + 3);
    assert!(tiny_font().with_kerning(vec![0], vec![0]).is_err());
}

#[test]
fn zero_width_glyph_is_not_displayable() {
    let f = tiny_font();
    assert!(f.can_display('A'));
    assert!(!f.can_display('B'));
    assert!(f.is_uppercase_only());
    assert_eq!((f.first_char(), f.last_char(), f.tracking()), ('A', 'C', 1));
}

#[test]
fn new_rejects_bad_tables() {
    assert!(BitmapFont::new(RasterBuffer::new(4, 1), 'A', 'B', vec![0, 2], 0).is_err());
    assert!(BitmapFont::new(RasterBuffer::new(4, 1), 'A', 'B', vec![0, 3, 2], 0).is_err());
    assert!(BitmapFont::new(RasterBuffer::new(4, 1), 'A', 'B', vec![0, 2, 5], 0).is_err());
    assert!(BitmapFont::new(RasterBuffer::new(4, 1), 'B', 'A', vec![0], 0).is_err());
}

#[test]
fn tint_keeps_coverage() {
    let f = builtin_font().tint(0x00ff_0000);
    let (x, _) = f.glyph_span(f.glyph_index('I'));
    assert_eq!(f.strip().get_pixel(x, 0), Some(0xffff_0000));
    assert_eq!(f.strip().get_pixel(x, 2), Some(0));
}

#[test]
fn registry_builds_default_lazily_and_falls_back() {
    let mut reg = FontRegistry::new();
    let a = reg.default_font();
    let b = reg.default_font();
    assert!(Arc::ptr_eq(&a, &b));

    reg.register("tiny", Arc::new(tiny_font()));
    assert_eq!(reg.resolve(Some("tiny")).height(), 4);
    assert_eq!(reg.resolve(Some("missing")).height(), 5);
    assert_eq!(reg.resolve(None).height(), 5);
    assert!(reg.get("missing").is_none());
}

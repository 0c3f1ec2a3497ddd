use super::*;

fn blit_1d<'a>(src: &'a [Argb], width: i32, dst: &'a mut [Argb]) -> Blit<'a> {
    let pixels = dst.len() as i32;
    Blit {
        src,
        src_stride: width,
        src_opaque: false,
        src_rect: IntRect::new(0, 0, width, 1),
        src_offset: 0,
        u: 0,
        v: 0,
        du: ONE,
        dv: 0,
        rotated: false,
        bilinear: false,
        alpha: 0xff,
        dst,
        dst_stride: pixels,
        dst_offset: 0,
        pixels,
        rows: 1,
    }
}

#[test]
fn opaque_row_replaces_destination_for_over_and_src() {
    for op in [CompositeOp::SrcOver, CompositeOp::Src] {
        let mut row = [0xff10_2030u32; 3];
        op.blend_row(&mut row, 0xffab_cdef);
        assert_eq!(row, [0xffab_cdef; 3]);
    }
}

#[test]
fn fully_transparent_source_leaves_destination() {
    for op in [CompositeOp::SrcOver, CompositeOp::Add, CompositeOp::Mult] {
        let mut d = 0xff40_5060;
        op.blend_pixel(&mut d, 0x0000_0000, 0xff);
        assert_eq!(d, 0xff40_5060, "{op:?}");
    }
}

#[cfg(not(feature = "straight-alpha"))]
#[test]
fn src_over_premultiplied_formulas() {
    assert_eq!(SrcOver::blend(0xff00_0000, 0x8080_8080), 0xff80_8080);
    assert_eq!(SrcOver::blend(0x1234_5678, 0xff11_2233), 0xff11_2233);
    // sa = 255*128 >> 8 = 127; color = 255*128 >> 8.
    assert_eq!(SrcOver::blend_alpha(0xff00_0000, 0xffff_ffff, 128), 0xff7f_7f7f);
}

#[test]
fn src_over_opaque_extra_alpha_interpolates() {
    assert_eq!(SrcOver::blend_opaque_alpha(0xff00_0000, 0xffff_ffff, 128), 0xff7f_7f7f);
    assert_eq!(SrcOver::blend_opaque_alpha(0xffff_ffff, 0xff00_0000, 128), 0xff7f_7f7f);
}

#[cfg(not(feature = "straight-alpha"))]
#[test]
fn src_attenuates_every_channel_when_premultiplied() {
    assert_eq!(Src::blend_alpha(0xffff_ffff, 0xff80_4020, 128), 0x7f40_2010);
    assert_eq!(Src::blend(0xffff_ffff, 0x0102_0304), 0x0102_0304);
}

#[test]
fn add_never_exceeds_full_intensity() {
    let samples = [0u32, 0x4080_c0ff, 0xffff_ffff, 0x80ff_0080, 0x7f7f_7f7f];
    for &d in &samples {
        for &s in &samples {
            for alpha in [0x40, 0xff] {
                let mut out = d;
                CompositeOp::Add.blend_pixel(&mut out, s, alpha);
                let (a, r, g, b) = channels(out);
                assert!(a <= 0xff && r <= 0xff && g <= 0xff && b <= 0xff);
                // Adding only ever brightens.
                assert!(r >= ((d >> 16) & 0xff) as i32);
            }
        }
    }
    assert_eq!(Add::blend_opaque(0xff80_8080, 0xff90_1020), 0xffff_90a0);
}

#[test]
fn mult_by_white_and_black() {
    assert_eq!(Mult::blend_opaque(0xffff_ffff, 0xff12_80fe), 0xff12_80fe);
    assert_eq!(Mult::blend_opaque(0xff00_0000, 0xff12_80fe), 0xff00_0000);
    assert_eq!(Mult::blend_opaque(0xff80_8080, 0xffff_ffff), 0xff80_8080);
}

#[test]
fn nearest_copy_and_upscale() {
    let src = [0xff00_0001, 0xff00_0002, 0xff00_0003];
    let mut dst = [0u32; 3];
    CompositeOp::SrcOver.blit(blit_1d(&src, 3, &mut dst));
    assert_eq!(dst, src);

    let mut dst = [0u32; 6];
    let mut b = blit_1d(&src, 3, &mut dst);
    b.du = ONE / 2;
    CompositeOp::Src.blit(b);
    assert_eq!(
        dst,
        [0xff00_0001, 0xff00_0001, 0xff00_0002, 0xff00_0002, 0xff00_0003, 0xff00_0003]
    );
}

#[test]
fn partial_render_alpha_skips_transparent_texels() {
    let src = [0x0000_0000, 0xffff_ffff];
    let mut dst = [0xff00_0000u32; 2];
    let mut b = blit_1d(&src, 2, &mut dst);
    b.alpha = 0;
    CompositeOp::SrcOver.blit(b);
    assert_eq!(dst, [0xff00_0000; 2]);

    let mut b = blit_1d(&src, 2, &mut dst);
    b.alpha = 128;
    CompositeOp::SrcOver.blit(b);
    assert_eq!(dst[0], 0xff00_0000);
    assert_ne!(dst[1], 0xff00_0000);
}

#[cfg(not(feature = "straight-alpha"))]
#[test]
fn bilinear_missing_top_row_is_transparent_for_translucent_sources() {
    let src = [0x8080_8080];
    let mut dst = [0u32];
    let mut b = blit_1d(&src, 1, &mut dst);
    b.bilinear = true;
    b.v = -ONE / 2;
    CompositeOp::Src.blit(b);
    assert_eq!(dst[0], 0x4040_4040);
}

#[test]
fn bilinear_rows_clamp_for_opaque_sources() {
    let src = [0xff80_8080];
    let mut dst = [0u32];
    let mut b = blit_1d(&src, 1, &mut dst);
    b.bilinear = true;
    b.src_opaque = true;
    b.v = -ONE / 2;
    b.u = -ONE / 2;
    CompositeOp::Src.blit(b);
    assert_eq!(dst[0], 0xff80_8080);
}

#[test]
fn rotated_bilinear_taps_outside_source_are_transparent() {
    let src = [0xffff_ffff];
    let mut dst = [0u32];
    let mut b = blit_1d(&src, 1, &mut dst);
    b.rotated = true;
    b.bilinear = true;
    b.u = -ONE / 2;
    CompositeOp::Src.blit(b);
    assert_eq!(dst[0], 0x7f7f_7f7f);
}

#[test]
fn rotated_nearest_walks_the_diagonal() {
    // 2x2 source sampled along (u, v) += (1, 1).
    let src = [0xff00_0001, 0xff00_0002, 0xff00_0003, 0xff00_0004];
    let mut dst = [0u32; 3];
    let mut b = blit_1d(&src, 2, &mut dst);
    b.src_rect = IntRect::new(0, 0, 2, 2);
    b.rotated = true;
    b.dv = ONE;
    CompositeOp::SrcOver.blit(b);
    assert_eq!(dst, [0xff00_0001, 0xff00_0004, 0]);
}

#[test]
fn composite_op_serializes_snake_case() {
    assert_eq!(serde_json::to_string(&CompositeOp::SrcOver).unwrap(), "\"src_over\"");
    let op: CompositeOp = serde_json::from_str("\"mult\"").unwrap();
    assert_eq!(op, CompositeOp::Mult);
}

use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        PaintError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(PaintError::asset("x").to_string().contains("asset error:"));
    assert!(PaintError::render("x").to_string().contains("render error:"));
    assert!(PaintError::config("x").to_string().contains("config error:"));
    assert!(
        PaintError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("disk on fire");
    let err = PaintError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("disk on fire"));
}

#[test]
fn anyhow_converts_with_question_mark() {
    fn inner() -> PaintResult<()> {
        let r: anyhow::Result<()> = Err(anyhow::anyhow!("nested"));
        r?;
        Ok(())
    }
    let err = inner().unwrap_err();
    assert!(matches!(err, PaintError::Other(_)));
}

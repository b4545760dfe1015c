use pagescope::kernel::error::EngineError;
use pagescope::kernel::metrics::contrast::{
    contrast_ratio, evaluate, evaluate_sample, is_large_text, ColorSample, ColorScheme, Rgba, Verdict,
};

fn sample(element: &str, scheme: ColorScheme, fg: &str, bg: &str) -> ColorSample {
    ColorSample {
        element_id: element.to_string(),
        scheme,
        foreground: fg.to_string(),
        background: bg.to_string(),
        font_size_px: 16.0,
        font_weight: 400,
    }
}

#[test]
fn test_gray_on_white_fails_aa() {
    let result = evaluate_sample(&sample(
        "p.caption",
        ColorScheme::Light,
        "rgb(153,153,153)",
        "rgb(255,255,255)",
    ))
    .expect("Both colors parse");

    assert!((result.ratio - 2.85).abs() < 0.01, "Ratio was {}", result.ratio);
    assert_eq!(result.aa, Verdict::Fail);
    assert_eq!(result.aaa, Verdict::Fail);
    assert!(!result.large_text);
}

#[test]
fn test_extreme_and_identical_pairs() {
    let black = Rgba::rgb(0, 0, 0);
    let white = Rgba::rgb(255, 255, 255);

    assert!((contrast_ratio(&black, &white) - 21.0).abs() < 1e-9);
    assert_eq!(contrast_ratio(&black, &white), contrast_ratio(&white, &black), "Ratio is symmetric");
    assert_eq!(contrast_ratio(&white, &white), 1.0);
}

#[test]
fn test_aa_boundary_gray() {
    let result = evaluate_sample(&sample("a", ColorScheme::Light, "#767676", "#fff")).unwrap();
    assert!(result.ratio >= 4.5);
    assert_eq!(result.aa, Verdict::Pass);
    assert_eq!(result.aaa, Verdict::Fail);
}

#[test]
fn test_large_text_relaxes_threshold() {
    let mut heading = sample("h1", ColorScheme::Light, "#949494", "white");
    let normal = evaluate_sample(&heading).unwrap();
    assert_eq!(normal.aa, Verdict::Fail);

    heading.font_size_px = 24.0;
    let large = evaluate_sample(&heading).unwrap();
    assert!(large.large_text);
    assert_eq!(large.aa, Verdict::Pass, "3.03:1 clears the 3:1 large text bar");
    assert_eq!(large.aaa, Verdict::Fail);

    assert!(is_large_text(18.66, 700));
    assert!(!is_large_text(18.66, 400));
    assert!(!is_large_text(18.0, 700));
}

#[test]
fn test_aaa_normal_text() {
    let result = evaluate_sample(&sample("p", ColorScheme::Light, "#595959", "#ffffff")).unwrap();
    assert_eq!(result.aa, Verdict::Pass);
    assert_eq!(result.aaa, Verdict::Pass);
}

#[test]
fn test_color_syntaxes() {
    let expected = Rgba::rgb(255, 0, 51);
    for text in ["#ff0033", "#FF0033", "rgb(255, 0, 51)", "rgb(255 0 51)", " rgb(255,0,51) "] {
        let parsed: Rgba = text.parse().unwrap_or_else(|e| panic!("{} failed: {}", text, e));
        assert!(parsed.same_bits(&expected), "{} parsed as {:?}", text, parsed);
    }

    let short: Rgba = "#f03".parse().unwrap();
    assert!(short.same_bits(&expected));

    let translucent: Rgba = "rgba(0, 0, 0, 0.5)".parse().unwrap();
    assert_eq!(translucent.a, 0.5);
    let slash: Rgba = "rgb(0 0 0 / 50%)".parse().unwrap();
    assert_eq!(slash.a, 0.5);
    let hex_alpha: Rgba = "#00000000".parse().unwrap();
    assert_eq!(hex_alpha.a, 0.0);
    let clear: Rgba = "transparent".parse().unwrap();
    assert_eq!(clear.a, 0.0);
}

#[test]
fn test_unrecognized_colors_rejected() {
    for text in ["", "#12", "#ggg", "rgb(1,2)", "hsl(0, 0%, 0%)", "rgb(a,b,c)"] {
        match text.parse::<Rgba>() {
            Err(EngineError::InvalidColor(raw)) => assert_eq!(raw, text),
            other => panic!("{:?} should be rejected, got {:?}", text, other),
        }
    }
}

#[test]
fn test_translucent_foreground_composited() {
    let fg: Rgba = "rgba(0,0,0,0.5)".parse().unwrap();
    let white = Rgba::rgb(255, 255, 255);

    let composited = fg.over(&white);
    assert!(composited.same_bits(&Rgba::rgb(128, 128, 128)));

    let ratio = contrast_ratio(&fg, &white);
    assert!((ratio - 3.95).abs() < 0.01, "Ratio was {}", ratio);
}

#[test]
fn test_evaluate_across_schemes() {
    let samples = vec![
        // Same colors in both schemes: not theme-aware
        sample("#nav", ColorScheme::Light, "#333", "#fff"),
        sample("#nav", ColorScheme::Dark, "#333", "#fff"),
        // Adapts, but the dark variant is too dim
        sample("#body", ColorScheme::Light, "#000", "#fff"),
        sample("#body", ColorScheme::Dark, "#444", "#222"),
        // Garbage from the driver
        sample("#ad", ColorScheme::Light, "var(--fg)", "#fff"),
    ];

    let metrics = evaluate(&samples, 10);

    assert_eq!(metrics.evaluated, 4);
    assert_eq!(metrics.unparseable, 1);
    assert_eq!(metrics.non_responsive, vec!["#nav".to_string()]);
    assert_eq!(metrics.aa_failures, 1);
    assert_eq!(metrics.worst[0].element_id, "#body");
    assert_eq!(metrics.worst[0].scheme, ColorScheme::Dark);
}

#[test]
fn test_sample_defaults_from_json() {
    let json = r##"{"elementId":"p.note","scheme":"dark","foreground":"#eee","background":"#111"}"##;
    let sample: ColorSample = serde_json::from_str(json).expect("Sample should parse");
    assert_eq!(sample.font_size_px, 16.0);
    assert_eq!(sample.font_weight, 400);
    assert_eq!(sample.scheme, ColorScheme::Dark);
}

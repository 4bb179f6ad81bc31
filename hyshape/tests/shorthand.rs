use hyshape::prelude::*;
use hyshape::shorthand::parse_chain;

fn context() -> DimContext {
    let ctx = DimContext::default();
    ctx.declare("Batch(b):20 SeqLength(t):10 EmbeddingDim(d):100 Heads(h):4")
        .unwrap();
    ctx
}

fn names(slots: &SlotList) -> Vec<String> {
    slots.iter().map(|slot| slot.to_string()).collect()
}

#[test]
fn compact_form_has_one_slot_per_character() {
    let ctx = context();
    let parsed = ctx.parse("btd").unwrap();
    assert!(parsed.is_compact());
    assert_eq!(
        names(parsed.source()),
        vec!["Batch(b)", "SeqLength(t)", "EmbeddingDim(d)"]
    );

    let with_literal = ctx.parse("b4").unwrap();
    assert!(with_literal.source().get(1).unwrap().as_expr().unwrap().is_lit());
}

#[test]
fn explicit_form_splits_on_top_level_commas() {
    let ctx = context();
    let parsed = ctx.parse("b, (t+1)*2, d//h").unwrap();
    assert!(parsed.is_explicit());
    assert_eq!(parsed.source().len(), 3);
    assert_eq!(
        ctx.shape("b,(t+1)*2,d//h").unwrap().evaluate().unwrap(),
        vec![20, 22, 25]
    );

    // A single arithmetic slot needs no comma.
    let single = ctx.parse("d//4").unwrap();
    assert!(single.is_explicit());
    assert_eq!(single.source().len(), 1);
}

#[test]
fn whitespace_is_insignificant() {
    let ctx = context();
    let spaced = ctx.shape(" b , t ,d * 2 ").unwrap();
    let tight = ctx.shape("b,t,d*2").unwrap();
    assert_eq!(spaced.to_string(), tight.to_string());
}

#[test]
fn arrow_form_splits_on_the_first_arrow() {
    let ctx = context();
    match ctx.parse("btd -> b,t,h,d//h").unwrap() {
        Shorthand::Arrow { source, target } => {
            assert_eq!(source.len(), 3);
            assert_eq!(target.len(), 4);
            assert_eq!(target.to_string(), "Batch(b),SeqLength(t),Heads(h),floor(EmbeddingDim(d)/Heads(h))");
        }
        other => panic!("expected an arrow, got {other:?}"),
    }
}

#[test]
fn placeholders_and_inferred_axes() {
    let ctx = context();
    let compact = ctx.parse("_b_").unwrap();
    assert_eq!(compact.source().anonymous_count(), 2);
    assert_eq!(compact.source().anonymous_position(1), Some(2));

    let explicit = ctx.parse(",b,,-1").unwrap();
    let slots = explicit.source();
    assert!(slots.get(0).unwrap().is_anonymous());
    assert!(slots.get(2).unwrap().is_anonymous());
    assert!(slots.get(3).unwrap().is_inferred());
    assert_eq!(slots.to_string(), "_,Batch(b),_,-1");
}

#[test]
fn reduction_mode_reads_numbers_as_placeholders() {
    let ctx = context();
    let parsed = Shorthand::parse(ctx.registry(), "2bd", LiteralMode::Anonymous).unwrap();
    assert!(parsed.source().get(0).unwrap().is_anonymous());

    let sized = Shorthand::parse(ctx.registry(), "2bd", LiteralMode::Size).unwrap();
    assert!(sized.source().get(0).unwrap().is_expr());
}

#[test]
fn unknown_symbols_are_reported_by_name() {
    let ctx = context();
    for spec in ["bxd", "b,t,x*2", "btd -> b,x"] {
        match ctx.parse(spec).unwrap_err() {
            ShapeError::NotDeclared { spec: reported, symbol } => {
                assert_eq!(symbol, "x");
                assert_eq!(reported, spec);
            }
            other => panic!("`{spec}` gave {other}"),
        }
    }
}

#[test]
fn malformed_arithmetic_is_a_parse_error() {
    let ctx = context();
    for spec in ["b,t,d//", "b,(t", "b,t+*d", "b,t)"] {
        let err = ctx.parse(spec).unwrap_err();
        assert!(err.is_parse_error(), "`{spec}` gave {err}");
    }
}

#[test]
fn annotations_name_every_axis() {
    let ctx = context();
    assert!(ctx.shape("b,_,d").unwrap_err().is_parse_error());
    assert!(ctx.shape("b,-1").unwrap_err().is_parse_error());
    assert!(ctx.shape("btd -> bd").unwrap_err().is_parse_error());
    assert!(ctx.permute_transform("btd").unwrap_err().is_parse_error());
}

#[test]
fn chains_split_on_every_arrow() {
    let ctx = context();
    let stages = parse_chain(ctx.registry(), "btd -> b,-1 -> -1").unwrap();
    assert_eq!(stages.len(), 3);
    assert!(stages[2].get(0).unwrap().is_inferred());

    let tight = parse_chain(ctx.registry(), "bt->-1").unwrap();
    assert_eq!(tight.len(), 2);
    assert_eq!(tight[1].to_string(), "-1");
}

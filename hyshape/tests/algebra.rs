use hyshape::expr::pretty::{expr_doc, shape_doc, to_plain_string};
use hyshape::prelude::*;

fn session() -> (DimContext, DimVar, DimVar, DimVar) {
    let ctx = DimContext::default();
    let mut dims = ctx
        .declare("Batch(b):20 SeqLength(t):10 EmbeddingDim(d):100")
        .unwrap();
    let d = dims.pop().unwrap();
    let t = dims.pop().unwrap();
    let b = dims.pop().unwrap();
    (ctx, b, t, d)
}

#[test]
fn floor_division_and_multiplication_follow_integer_semantics() {
    let (_ctx, _, _, d) = session();
    for k in 1..=13i64 {
        assert_eq!(floor_div(&d, k).unwrap().evaluate().unwrap(), 100 / k);
        assert_eq!(mul(&d, k).evaluate().unwrap(), 100 * k);
    }
    assert_eq!(floor_div(-7, 2).unwrap().evaluate().unwrap(), -4);
}

#[test]
fn rendering_shows_symbolic_form_and_size() {
    let (_ctx, b, t, d) = session();
    assert_eq!(b.to_string(), "Batch(b):20");
    assert_eq!(SymExpr::var(&b).to_string(), "Batch(b):20");
    assert_eq!(
        floor_div(&d, 4).unwrap().to_string(),
        "floor(EmbeddingDim(d)/4):25"
    );
    assert_eq!((&b * &t).to_string(), "Batch(b)*SeqLength(t):200");
    assert_eq!(
        mul(add(&b, &t), 2).to_string(),
        "(Batch(b) + SeqLength(t))*2:60"
    );
    assert_eq!(sub(&d, sub(&b, &t)).to_string(), "EmbeddingDim(d) - (Batch(b) - SeqLength(t)):90");
    assert_eq!(SymExpr::lit(7).to_string(), "7");
}

#[test]
fn unsized_variables_render_symbolically() {
    let (ctx, _, _, d) = session();
    let h = ctx.declare("Heads(h)").unwrap().remove(0);
    let e = floor_div(&d, &h).unwrap();
    assert_eq!(e.to_string(), "floor(EmbeddingDim(d)/Heads(h))");
    match e.evaluate().unwrap_err() {
        ShapeError::UnresolvedSize { symbol, .. } => assert_eq!(symbol, "h"),
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn zero_divisors_are_invalid_operands() {
    let (_ctx, b, _, d) = session();
    assert!(floor_div(&d, 0).unwrap_err().is_invalid_operand());

    // A symbolic divisor is only known to be zero once evaluated.
    let e = floor_div(&d, &b - &b).unwrap();
    assert!(e.evaluate().unwrap_err().is_invalid_operand());
}

#[test]
fn equality_is_by_value_structure_is_separate() {
    let (_ctx, b, t, d) = session();
    let quarter = floor_div(&d, 4).unwrap();
    assert_eq!(quarter, SymExpr::lit(25));
    assert!(!quarter.structurally_eq(&SymExpr::lit(25)));
    assert!(quarter.structurally_eq(&floor_div(&d, 4).unwrap()));

    // Same value, different trees.
    assert_eq!(&b * 5, &t * 10);
    assert!(!(&b * 5).structurally_eq(&(&t * 10)));
    assert!(SymExpr::var(&t) < SymExpr::var(&b));
}

#[test]
fn substitution_and_free_variables() {
    let (ctx, b, _, d) = session();
    let h = ctx.declare("Heads(h)").unwrap().remove(0);
    let e = add(floor_div(&d, &h).unwrap(), &b);
    assert_eq!(e.free_vars(), vec![d.clone(), h.clone(), b.clone()]);

    let replaced = e.substitute(&|dim: &DimVar| (dim == &h).then(|| SymExpr::lit(5)));
    assert_eq!(replaced.evaluate().unwrap(), 40);
    assert_eq!(replaced.free_vars(), vec![d, b]);
}

#[test]
fn product_of_factors() {
    let (_ctx, b, t, d) = session();
    assert_eq!(product([&b, &t, &d]).evaluate().unwrap(), 20_000);
    assert_eq!(product(Vec::<SymExpr>::new()), SymExpr::lit(1));
}

#[test]
fn parsed_expressions_match_built_ones() {
    let (ctx, b, t, d) = session();
    assert!(ctx.expr("d//4").unwrap().structurally_eq(&floor_div(&d, 4).unwrap()));
    assert!(ctx.expr("(b + t) * 2").unwrap().structurally_eq(&mul(add(&b, &t), 2)));
    assert!(ctx.expr("b - t - 1").unwrap().structurally_eq(&sub(sub(&b, &t), 1)));
    assert_eq!(ctx.expr("-b").unwrap().evaluate().unwrap(), -20);
    assert!(ctx.expr("d/4").unwrap_err().is_invalid_operand());
    assert!(ctx.expr("d//0").unwrap_err().is_invalid_operand());
    assert!(ctx.expr("d*").unwrap_err().is_parse_error());
    assert!(ctx.expr("q+1").unwrap_err().is_not_declared());
}

#[test]
fn shape_tuples_compare_against_concrete_shapes() {
    let (ctx, b, t, d) = session();
    let shape: ShapeTuple = [b.clone(), t.clone(), d.clone()].into_iter().collect();
    assert_eq!(shape.to_string(), "(Batch(b):20, SeqLength(t):10, EmbeddingDim(d):100)");
    assert_eq!(shape.evaluate().unwrap(), vec![20, 10, 100]);
    assert_eq!(shape.numel().unwrap(), 20_000);
    assert_eq!(shape.axis_of(&d), Some(2));
    assert!(shapes_equal(&shape, &[20, 10, 100]));
    assert!(!shapes_equal(&shape, &[20, 10]));
    assert!(!shapes_equal(&shape, &[20, 10, 99]));
    assert!(check_shape(&shape, &[20, 10, 100]).is_ok());
    assert!(check_shape(&shape, &[1, 2, 3]).unwrap_err().is_shape_mismatch());

    let heads = ctx.shape("b,t,4,d//4").unwrap();
    assert!(shapes_equal(&heads, &[20, 10, 4, 25]));
    assert_eq!(heads.index_of(&floor_div(&d, 4).unwrap()), Some(3));
    assert!(ctx.check("b,t,d*2", &[20, 10, 200]).is_ok());
    assert_eq!(
        ctx.check("b,t,d*2", &[20, 10, 100]).unwrap_err().spec(),
        "b,t,d*2"
    );

    let single: ShapeTuple = [b].into_iter().collect();
    assert_eq!(single.to_string(), "(Batch(b):20,)");
    assert_eq!(single.concat(&heads).len(), 5);
    assert_eq!(ShapeTuple::new().numel().unwrap(), 1);
}

#[test]
fn pretty_documents_render_like_display() {
    let (ctx, _, _, d) = session();
    let e = mul(floor_div(&d, 4).unwrap(), 3);
    assert_eq!(to_plain_string(&expr_doc(&e), 80), e.to_string());

    let shape = ctx.shape("b,t,d//4").unwrap();
    assert_eq!(to_plain_string(&shape_doc(&shape), 120), shape.to_string());
}

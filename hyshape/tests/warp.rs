use std::cell::RefCell;

use hyshape::prelude::*;
use hyshape::warp::ShapeBackendError;

fn context() -> DimContext {
    let ctx = DimContext::default();
    ctx.declare("Batch(b):20 SeqLength(t):10 EmbeddingDim(d):100 K(k):1 Heads(h):4")
        .unwrap();
    ctx
}

/// Shape backend recording every host call.
#[derive(Default)]
struct Recording {
    calls: RefCell<Vec<String>>,
}

impl TensorBackend for Recording {
    type Tensor = Vec<i64>;
    type Error = ShapeBackendError;

    fn shape(&self, tensor: &Vec<i64>) -> Vec<i64> {
        tensor.clone()
    }

    fn view(&self, tensor: Vec<i64>, sizes: &[i64]) -> Result<Vec<i64>, ShapeBackendError> {
        self.calls.borrow_mut().push(format!("view{sizes:?}"));
        ShapeBackend.view(tensor, sizes)
    }

    fn permute(&self, tensor: Vec<i64>, perm: &[usize]) -> Result<Vec<i64>, ShapeBackendError> {
        self.calls.borrow_mut().push(format!("permute{perm:?}"));
        ShapeBackend.permute(tensor, perm)
    }

    fn expand(&self, tensor: Vec<i64>, factors: &[i64]) -> Result<Vec<i64>, ShapeBackendError> {
        self.calls.borrow_mut().push(format!("expand{factors:?}"));
        ShapeBackend.expand(tensor, factors)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("device ran out of memory")]
struct OutOfMemory;

/// Backend whose expand always fails.
struct NoExpand;

impl TensorBackend for NoExpand {
    type Tensor = Vec<i64>;
    type Error = OutOfMemory;

    fn shape(&self, tensor: &Vec<i64>) -> Vec<i64> {
        tensor.clone()
    }

    fn view(&self, _: Vec<i64>, sizes: &[i64]) -> Result<Vec<i64>, OutOfMemory> {
        Ok(sizes.to_vec())
    }

    fn permute(&self, tensor: Vec<i64>, perm: &[usize]) -> Result<Vec<i64>, OutOfMemory> {
        Ok(perm.iter().map(|axis| tensor[*axis]).collect())
    }

    fn expand(&self, _: Vec<i64>, _: &[i64]) -> Result<Vec<i64>, OutOfMemory> {
        Err(OutOfMemory)
    }
}

#[test]
fn view_chain_round_trips() {
    let ctx = context();
    for chain in ["btd -> b,t,h,d//h -> btd", "btd -> b,t,4,d//4 -> btd"] {
        let out = ctx
            .warp_shape(chain, "vv", &[20, 10, 100], WarpOptions::default())
            .unwrap();
        assert_eq!(out, vec![20, 10, 100], "{chain}");
    }
}

#[test]
fn steps_run_in_order_against_the_current_shape() {
    let ctx = context();
    let backend = Recording::default();
    let out = ctx
        .warp(
            &backend,
            vec![20, 10, 100],
            "btd -> b,t,h,d//h -> b,h,t,d//h",
            "vp",
            WarpOptions::verbose(),
        )
        .unwrap();
    assert_eq!(out, vec![20, 4, 10, 25]);
    assert_eq!(
        *backend.calls.borrow(),
        vec!["view[20, 10, 4, 25]", "permute[0, 2, 1, 3]"]
    );
}

#[test]
fn expand_and_align_steps() {
    let ctx = context();
    assert_eq!(
        ctx.warp_shape("bkd -> b,k*5,d", "e", &[20, 1, 100], WarpOptions::default())
            .unwrap(),
        vec![20, 5, 100]
    );
    assert_eq!(
        ctx.warp_shape("td -> btd -> dtb", "at", &[10, 100], WarpOptions::default())
            .unwrap(),
        vec![100, 10, 1]
    );
}

#[test]
fn verbosity_does_not_change_the_result() {
    let ctx = context();
    let chain = "btd -> b,t,h,d//h -> b,h,t,d//h -> b*h,t,d//h";
    let quiet = ctx
        .warp_shape(chain, "vpv", &[2, 3, 64], WarpOptions::default())
        .unwrap();
    let verbose = ctx
        .warp_shape(chain, "vpv", &[2, 3, 64], WarpOptions::verbose())
        .unwrap();
    assert_eq!(quiet, vec![8, 3, 16]);
    assert_eq!(quiet, verbose);
}

#[test]
fn misconfigured_chains_fail_before_any_host_call() {
    let ctx = context();
    for (chain, tags) in [
        ("btd -> b,t,h,d//h -> btd", "v"),
        ("btd -> b,t,h,d//h", "vv"),
        ("btd -> b,t,h,d//h -> btd", "vx"),
    ] {
        let backend = Recording::default();
        let err = ctx
            .warp(&backend, vec![20, 10, 100], chain, tags, WarpOptions::default())
            .unwrap_err();
        assert!(err.is_configuration_error(), "{chain} / {tags}: {err}");
        assert!(backend.calls.borrow().is_empty());
    }

    let backend = Recording::default();
    let err = ctx
        .warp(&backend, vec![20, 10, 100], "btd -> b,q", "v", WarpOptions::default())
        .unwrap_err();
    assert!(err.is_not_declared());
    assert!(backend.calls.borrow().is_empty());
}

#[test]
fn resolver_errors_stop_the_chain() {
    let ctx = context();
    let backend = Recording::default();
    let err = ctx
        .warp(
            &backend,
            vec![20, 10, 100],
            "btd -> b,t,h,d//h -> b,k,t,d//h",
            "vp",
            WarpOptions::default(),
        )
        .unwrap_err();
    assert!(err.is_unmatched_dimension());
    assert_eq!(backend.calls.borrow().len(), 1);
}

#[test]
fn host_failures_are_wrapped() {
    let ctx = context();
    match ctx
        .warp(&NoExpand, vec![20, 1, 100], "bkd -> b,k*5,d", "e", WarpOptions::default())
        .unwrap_err()
    {
        ShapeError::Backend { step, source, .. } => {
            assert_eq!(step, "expand");
            assert_eq!(source.to_string(), "device ran out of memory");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn plans_can_be_inspected_and_reused() {
    let ctx = context();
    let plan = ctx.plan("btd -> b,t,h,d//h -> btd", "vv").unwrap();
    assert_eq!(plan.len(), 2);
    assert_eq!(plan.kinds(), &[StepKind::View, StepKind::View]);
    assert_eq!(plan.stages()[1].len(), 4);

    for shape in [vec![20, 10, 100], vec![3, 5, 100]] {
        let out = plan
            .run(&ShapeBackend, shape.clone(), WarpOptions::default())
            .unwrap();
        assert_eq!(out, shape);
    }
}

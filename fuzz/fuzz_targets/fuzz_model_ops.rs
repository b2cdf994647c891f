#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use potassium_core::{DataModel, DataObject, EventDetail, EventFilter};
use serde_json::{Value as Json, json};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Arbitrary, Debug)]
enum Scalar {
    Null,
    Bool(bool),
    Int(i32),
    Text(u8),
}

impl Scalar {
    fn to_json(&self) -> Json {
        match self {
            Self::Null => Json::Null,
            Self::Bool(b) => json!(b),
            Self::Int(n) => json!(n),
            Self::Text(n) => json!(format!("t{}", n % 4)),
        }
    }
}

#[derive(Arbitrary, Debug)]
enum Op {
    Set(u8, Scalar),
    Batch(Vec<(u8, Scalar)>),
    Increment(u8, i16),
    Reset(Vec<(u8, Scalar)>),
}

fn field(n: u8) -> String {
    format!("f{}", n % 5)
}

fn object(pairs: &[(u8, Scalar)]) -> Json {
    Json::Object(pairs.iter().map(|(f, v)| (field(*f), v.to_json())).collect())
}

fuzz_target!(|ops: Vec<Op>| {
    let model = DataModel::new();
    let log: Rc<RefCell<Vec<(String, EventDetail)>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let _sub = model.subscribe(EventFilter::All, move |name, event| {
        sink.borrow_mut().push((name.to_owned(), event.detail.clone()));
    });

    for op in ops.iter().take(64) {
        log.borrow_mut().clear();
        let result = match op {
            Op::Set(f, v) => model.set(field(*f), v.to_json()),
            Op::Batch(pairs) => model.set_json(object(pairs)),
            Op::Increment(f, n) => model.increment(&field(*f), i64::from(*n)),
            Op::Reset(pairs) => model.reset(object(pairs)).map(|()| Default::default()),
        };
        if result.is_err() {
            continue;
        }

        // Per-field events come first, then exactly one batch event.
        let log = log.borrow();
        if let Some((last, detail)) = log.last() {
            assert_eq!(last, "changed");
            assert!(matches!(detail, EventDetail::Changed(_)));
            let batches = log.iter().filter(|(name, _)| name == "changed").count();
            assert_eq!(batches, 1);
        }
    }
});

use std::sync::Arc;

use classweave::{
    bytecode::opcodes::*,
    classfile::{CodeAttribute, CodeSubAttribute, Constant, ConstantPool, ExceptionHandler},
    instrument::{Instrumenter, MethodAccessFlags, MethodSource},
    objectives::ObjectiveStore,
    replacement::{ClassHierarchy, ReplacementRegistry},
    InstrumentationConfig,
};

/// Assembles a `Code` attribute body
fn code_attribute(
    max_stack: u16,
    max_locals: u16,
    code: &[u8],
    handlers: &[(u16, u16, u16, u16)],
    attributes: &[(u16, Vec<u8>)],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&max_stack.to_be_bytes());
    out.extend_from_slice(&max_locals.to_be_bytes());
    out.extend_from_slice(&(code.len() as u32).to_be_bytes());
    out.extend_from_slice(code);

    out.extend_from_slice(&(handlers.len() as u16).to_be_bytes());
    for (start, end, handler, catch_type) in handlers {
        for value in [start, end, handler, catch_type] {
            out.extend_from_slice(&value.to_be_bytes());
        }
    }

    out.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
    for (name_index, body) in attributes {
        out.extend_from_slice(&name_index.to_be_bytes());
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
    }
    out
}

fn line_number_table(entries: &[(u16, u16)]) -> Vec<u8> {
    let mut body = (entries.len() as u16).to_be_bytes().to_vec();
    for (start_pc, line) in entries {
        body.extend_from_slice(&start_pc.to_be_bytes());
        body.extend_from_slice(&line.to_be_bytes());
    }
    body
}

fn instrumenter(config: InstrumentationConfig) -> Instrumenter {
    Instrumenter::new(
        Arc::new(ReplacementRegistry::standard().unwrap()),
        Arc::new(ClassHierarchy::standard()),
        Arc::new(ObjectiveStore::new()),
        config,
    )
}

fn source(name: &str, descriptor: &str, code: Option<Vec<u8>>) -> MethodSource {
    MethodSource {
        class_name: "com/example/Controller".to_string(),
        name: name.to_string(),
        descriptor: descriptor.to_string(),
        access: if code.is_some() {
            MethodAccessFlags::PUBLIC
        } else {
            MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT
        },
        code,
    }
}

/// Pool with `String.equals`, `Integer.parseInt`, `String.length` and `LineNumberTable`
fn class_pool() -> (ConstantPool, [u16; 4]) {
    let mut pool = ConstantPool::new();
    let equals = pool
        .add_method_ref("java/lang/String", "equals", "(Ljava/lang/Object;)Z", false)
        .unwrap();
    let parse_int = pool
        .add_method_ref("java/lang/Integer", "parseInt", "(Ljava/lang/String;)I", false)
        .unwrap();
    let length = pool
        .add_method_ref("java/lang/String", "length", "()I", false)
        .unwrap();
    let line_numbers = pool.add_utf8("LineNumberTable").unwrap();
    (pool, [equals, parse_int, length, line_numbers])
}

fn methods(indices: [u16; 4]) -> Vec<MethodSource> {
    let [equals, parse_int, length, line_numbers] = indices;
    let [eh, el] = equals.to_be_bytes();
    let [ph, pl] = parse_int.to_be_bytes();
    let [lh, ll] = length.to_be_bytes();

    vec![
        source(
            "same",
            "(Ljava/lang/String;Ljava/lang/Object;)Z",
            Some(code_attribute(
                2,
                3,
                &[ALOAD_1, ALOAD_2, INVOKEVIRTUAL, eh, el, IRETURN],
                &[],
                &[(line_numbers, line_number_table(&[(0, 21)]))],
            )),
        ),
        source(
            "parse",
            "(Ljava/lang/String;)I",
            Some(code_attribute(
                1,
                2,
                &[ALOAD_1, INVOKESTATIC, ph, pl, IRETURN],
                &[],
                &[(line_numbers, line_number_table(&[(0, 30)]))],
            )),
        ),
        source(
            "size",
            "(Ljava/lang/String;)I",
            Some(code_attribute(1, 2, &[ALOAD_1, INVOKEVIRTUAL, lh, ll, IRETURN], &[], &[])),
        ),
        source("handle", "()V", None),
    ]
}

#[test]
fn class_is_instrumented() {
    let (mut pool, indices) = class_pool();
    let sources = methods(indices);
    let count = pool.count();

    let instrumenter = instrumenter(InstrumentationConfig::default());
    let results = instrumenter.instrument_methods(&mut pool, &sources).unwrap();

    let replaced: Vec<usize> = results.iter().map(|method| method.replaced).collect();
    assert_eq!(replaced, [1, 1, 0, 0]);
    assert!(pool.count() > count);

    // untouched and bodyless methods come back as they went in
    assert_eq!(results[2].code, sources[2].code);
    assert_eq!(results[3].code, None);
    assert_eq!(results[3].name, "handle");

    let same = CodeAttribute::parse(results[0].code.as_ref().unwrap(), &pool).unwrap();
    assert_eq!(same.max_stack, 3);
    assert_eq!(same.max_locals, 3);

    let parse = CodeAttribute::parse(results[1].code.as_ref().unwrap(), &pool).unwrap();
    assert_eq!(parse.max_stack, 2);
    assert_eq!(parse.code[..2], [ALOAD_1, LDC]);
    let target = u16::from_be_bytes([parse.code[4], parse.code[5]]);
    let call = pool.member_ref(target).unwrap();
    assert_eq!(call.owner, "classweave/runtime/IntegerClassReplacement");
    assert_eq!(call.descriptor, "(Ljava/lang/String;Ljava/lang/String;)I");

    // methods are rewritten in parallel, so only membership is deterministic
    let store = instrumenter.store();
    for id in [
        "MethodReplacement_at_com.example.Controller_00021_0_BOOLEAN_true",
        "MethodReplacement_at_com.example.Controller_00021_0_BOOLEAN_false",
        "MethodReplacement_at_com.example.Controller_00030_0_EXCEPTION_true",
        "MethodReplacement_at_com.example.Controller_00030_0_EXCEPTION_false",
    ] {
        assert!(store.contains(id), "missing {id}");
    }
    let ids = store.ids();
    assert_eq!(ids.len(), 4);
}

#[test]
fn parallel_and_sequential_agree() {
    let (mut parallel_pool, indices) = class_pool();
    let (mut sequential_pool, _) = class_pool();
    let sources = methods(indices);

    let parallel = instrumenter(InstrumentationConfig::default())
        .instrument_methods(&mut parallel_pool, &sources)
        .unwrap();
    let sequential = instrumenter(InstrumentationConfig::sequential())
        .instrument_methods(&mut sequential_pool, &sources)
        .unwrap();

    assert_eq!(parallel, sequential);
    assert_eq!(parallel_pool.to_bytes(), sequential_pool.to_bytes());
}

#[test]
fn exception_ranges_follow_inserted_code() {
    let (mut pool, [equals, _, _, line_numbers]) = class_pool();
    let [eh, el] = equals.to_be_bytes();

    // 0..6 guarded; 6: astore_3, iconst_0, ireturn
    let code = [
        ALOAD_1, ALOAD_2, INVOKEVIRTUAL, eh, el, IRETURN, ASTORE_3, ICONST_0, IRETURN,
    ];
    let body = code_attribute(
        2,
        4,
        &code,
        &[(0, 6, 6, 0)],
        &[(line_numbers, line_number_table(&[(0, 40), (6, 41)]))],
    );
    let method = source("safe", "(Ljava/lang/String;Ljava/lang/Object;)Z", Some(body));

    let instrumenter = instrumenter(InstrumentationConfig::default());
    let result = instrumenter.instrument_method(&mut pool, &method).unwrap();
    let attribute = CodeAttribute::parse(&result.code.unwrap(), &pool).unwrap();

    assert_eq!(
        attribute.exception_table,
        [ExceptionHandler {
            start_pc: 0,
            end_pc: 8,
            handler_pc: 8,
            catch_type: 0,
        }]
    );
    assert_eq!(attribute.code[8], ASTORE_3);

    let lines: Vec<(u16, u16)> = attribute
        .attributes
        .iter()
        .filter_map(|attribute| match attribute {
            CodeSubAttribute::LineNumberTable { entries, .. } => Some(entries),
            _ => None,
        })
        .flatten()
        .map(|entry| (entry.start_pc, entry.line))
        .collect();
    assert_eq!(lines, [(0, 40), (8, 41)]);

    let Constant::String(template) = pool.get(u16::from(attribute.code[3])).unwrap() else {
        panic!("ldc does not load a string");
    };
    assert_eq!(
        pool.utf8(*template).unwrap(),
        "MethodReplacement_at_com.example.Controller_00040_0"
    );
}

#[test]
fn objective_store_is_shared_between_instrumenters() {
    let registry = Arc::new(ReplacementRegistry::standard().unwrap());
    let resolver = Arc::new(ClassHierarchy::standard());
    let store = Arc::new(ObjectiveStore::new());

    let first = Instrumenter::new(
        Arc::clone(&registry),
        resolver.clone(),
        Arc::clone(&store),
        InstrumentationConfig::default(),
    );
    let second = Instrumenter::new(
        registry,
        resolver,
        Arc::clone(&store),
        InstrumentationConfig::default(),
    );

    let (mut pool, indices) = class_pool();
    let sources = methods(indices);
    first.instrument_methods(&mut pool, &sources).unwrap();

    let (mut pool, _) = class_pool();
    second.instrument_methods(&mut pool, &sources).unwrap();

    assert_eq!(store.len(), 4);
}

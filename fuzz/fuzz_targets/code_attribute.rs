#![no_main]

use libfuzzer_sys::fuzz_target;
use classweave::{
    bytecode::{decode, encode},
    classfile::{CodeAttribute, ConstantPool},
};

fuzz_target!(|data: &[u8]| {
    let mut pool = ConstantPool::new();
    let Ok(code) = CodeAttribute::parse(data, &pool) else {
        return;
    };
    let Ok(instructions) = decode(&code, &pool) else {
        return;
    };

    // An unmodified stream keeps its layout, only padding bytes may differ
    let encoded = encode(&instructions, &mut pool).expect("decoded code re-encodes");
    assert_eq!(encoded.code.len(), code.code.len());

    let relocated = CodeAttribute {
        code: encoded.code,
        ..code
    };
    let again = decode(&relocated, &pool).expect("re-encoded code decodes");
    assert_eq!(again, instructions);
});

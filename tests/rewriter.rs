use classweave::prelude::*;

const CLASS: &str = "com/example/Service";

struct Fixture {
    registry: ReplacementRegistry,
    resolver: ClassHierarchy,
    store: ObjectiveStore,
    config: InstrumentationConfig,
}

impl Fixture {
    fn new(config: InstrumentationConfig) -> Self {
        Fixture {
            registry: ReplacementRegistry::standard().unwrap(),
            resolver: ClassHierarchy::standard(),
            store: ObjectiveStore::new(),
            config,
        }
    }

    fn with_registry(registry: ReplacementRegistry) -> Self {
        Fixture {
            registry,
            ..Fixture::new(InstrumentationConfig::default())
        }
    }

    fn rewriter(&self) -> Rewriter<'_> {
        Rewriter::new(&self.registry, &self.resolver, &self.store, &self.config)
    }

    fn rewrite(&self, method_name: &str, instructions: Vec<Instruction>) -> RewrittenMethod {
        self.rewriter()
            .rewrite(&context(method_name), instructions)
            .unwrap()
    }
}

fn context(method_name: &str) -> MethodContext<'_> {
    MethodContext {
        class_name: CLASS,
        method_name,
        descriptor: "()V",
        max_stack: 4,
    }
}

fn line(line: u16, label: u32) -> [Instruction; 2] {
    [
        Instruction::Label(Label(label)),
        Instruction::LineNumber {
            line,
            start: Label(label),
        },
    ]
}

fn call(kind: InvokeKind, owner: &str, name: &str, descriptor: &str) -> Instruction {
    Instruction::Method(MethodInsn::new(kind, owner, name, descriptor))
}

fn string_equals() -> Instruction {
    call(
        InvokeKind::Virtual,
        "java/lang/String",
        "equals",
        "(Ljava/lang/Object;)Z",
    )
}

fn templates(instructions: &[Instruction]) -> Vec<&str> {
    instructions
        .iter()
        .filter_map(|instruction| match instruction {
            Instruction::LoadString(template) => Some(template.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn equals_on_line_ten_end_to_end() {
    let fixture = Fixture::new(InstrumentationConfig::default());

    let mut instructions = line(10, 0).to_vec();
    instructions.extend([
        Instruction::Simple(opcodes::ALOAD_1),
        Instruction::Simple(opcodes::ALOAD_2),
        string_equals(),
        Instruction::Var {
            opcode: opcodes::ISTORE,
            index: 3,
            wide: false,
        },
        Instruction::Simple(opcodes::RETURN),
    ]);

    let rewritten = fixture.rewrite("check", instructions);

    let template = "MethodReplacement_at_com.example.Service_00010_0";
    let mut expected = line(10, 0).to_vec();
    expected.extend([
        Instruction::Simple(opcodes::ALOAD_1),
        Instruction::Simple(opcodes::ALOAD_2),
        Instruction::LoadString(template.to_string()),
        call(
            InvokeKind::Static,
            "classweave/runtime/StringClassReplacement",
            "equals",
            "(Ljava/lang/String;Ljava/lang/Object;Ljava/lang/String;)Z",
        ),
        Instruction::Var {
            opcode: opcodes::ISTORE,
            index: 3,
            wide: false,
        },
        Instruction::Simple(opcodes::RETURN),
    ]);

    assert_eq!(rewritten.instructions, expected);
    assert_eq!(rewritten.replaced, 1);
    assert_eq!(rewritten.max_stack, 5);

    assert_eq!(fixture.store.len(), 2);
    assert!(fixture.store.contains(&format!("{template}_BOOLEAN_true")));
    assert!(fixture.store.contains(&format!("{template}_BOOLEAN_false")));
}

#[test]
fn calls_outside_runtime_library_are_kept() {
    // The owner is not resolvable, so any resolution attempt would fail the rewrite
    let fixture = Fixture::new(InstrumentationConfig::default());

    let mut instructions = line(3, 0).to_vec();
    instructions.extend([
        Instruction::Simple(opcodes::ALOAD_1),
        Instruction::Simple(opcodes::ALOAD_2),
        call(
            InvokeKind::Virtual,
            "com/example/Text",
            "equals",
            "(Ljava/lang/Object;)Z",
        ),
        Instruction::Simple(opcodes::IRETURN),
    ]);

    let rewritten = fixture.rewrite("check", instructions.clone());
    assert_eq!(rewritten.instructions, instructions);
    assert_eq!(rewritten.replaced, 0);
    assert!(fixture.store.is_empty());
}

#[test]
fn static_initializer_is_kept() {
    let fixture = Fixture::new(InstrumentationConfig::default());

    let mut instructions = line(1, 0).to_vec();
    instructions.extend([
        Instruction::Simple(opcodes::ALOAD_1),
        Instruction::Simple(opcodes::ALOAD_2),
        string_equals(),
        Instruction::Simple(opcodes::POP),
        Instruction::Simple(opcodes::RETURN),
    ]);

    let rewritten = fixture.rewrite("<clinit>", instructions.clone());
    assert_eq!(rewritten.instructions, instructions);
    assert!(fixture.store.is_empty());
}

#[test]
fn special_dispatch_is_kept() {
    let fixture = Fixture::new(InstrumentationConfig::default());

    let mut instructions = line(5, 0).to_vec();
    instructions.extend([
        Instruction::Simple(opcodes::ALOAD_0),
        Instruction::Simple(opcodes::ALOAD_1),
        call(
            InvokeKind::Special,
            "java/util/AbstractCollection",
            "contains",
            "(Ljava/lang/Object;)Z",
        ),
        Instruction::Simple(opcodes::IRETURN),
    ]);

    let rewritten = fixture.rewrite("contains", instructions.clone());
    assert_eq!(rewritten.instructions, instructions);
    assert_eq!(rewritten.replaced, 0);
}

#[test]
fn indices_are_dense_per_line() {
    let fixture = Fixture::new(InstrumentationConfig::default());

    let mut instructions = line(7, 0).to_vec();
    for _ in 0..3 {
        instructions.extend([
            Instruction::Simple(opcodes::ALOAD_1),
            Instruction::Simple(opcodes::ALOAD_2),
            string_equals(),
            Instruction::Simple(opcodes::POP),
        ]);
    }
    instructions.extend(line(8, 20));
    instructions.extend([
        Instruction::Simple(opcodes::ALOAD_1),
        call(
            InvokeKind::Static,
            "java/lang/Integer",
            "parseInt",
            "(Ljava/lang/String;)I",
        ),
        Instruction::Simple(opcodes::IRETURN),
    ]);

    let rewritten = fixture.rewrite("run", instructions);
    assert_eq!(
        templates(&rewritten.instructions),
        [
            "MethodReplacement_at_com.example.Service_00007_0",
            "MethodReplacement_at_com.example.Service_00007_1",
            "MethodReplacement_at_com.example.Service_00007_2",
            "MethodReplacement_at_com.example.Service_00008_0",
        ]
    );
    assert_eq!(rewritten.replaced, 4);
    assert_eq!(fixture.store.len(), 8);
    assert!(fixture
        .store
        .contains("MethodReplacement_at_com.example.Service_00008_0_EXCEPTION_false"));
}

#[test]
fn interface_call_uses_ancestor_provider() {
    let fixture = Fixture::new(InstrumentationConfig::default());

    let mut instructions = line(2, 0).to_vec();
    instructions.extend([
        Instruction::Simple(opcodes::ALOAD_1),
        Instruction::Simple(opcodes::ALOAD_2),
        call(
            InvokeKind::Interface,
            "java/util/List",
            "contains",
            "(Ljava/lang/Object;)Z",
        ),
        Instruction::Simple(opcodes::IRETURN),
    ]);

    let rewritten = fixture.rewrite("run", instructions);
    let Instruction::Method(replacement) = &rewritten.instructions[5] else {
        panic!("expected the replacement call");
    };
    assert_eq!(replacement.kind, InvokeKind::Static);
    assert!(!replacement.is_interface);
    assert_eq!(
        replacement.owner,
        "classweave/runtime/CollectionClassReplacement"
    );
    assert_eq!(
        replacement.descriptor,
        "(Ljava/util/Collection;Ljava/lang/Object;Ljava/lang/String;)Z"
    );
}

#[test]
fn disabled_registration_passes_null() {
    let fixture = Fixture::new(InstrumentationConfig::without_registration());

    let mut instructions = line(4, 0).to_vec();
    instructions.extend([
        Instruction::Simple(opcodes::ALOAD_1),
        Instruction::Simple(opcodes::ALOAD_2),
        string_equals(),
        Instruction::Simple(opcodes::IRETURN),
    ]);

    let rewritten = fixture.rewrite("run", instructions);
    assert_eq!(
        rewritten.instructions[4],
        Instruction::Simple(opcodes::ACONST_NULL)
    );
    assert!(templates(&rewritten.instructions).is_empty());
    assert!(fixture.store.is_empty());
}

#[test]
fn max_stack_grows_by_one_per_method() {
    let fixture = Fixture::new(InstrumentationConfig::default());

    let mut instructions = line(1, 0).to_vec();
    for _ in 0..5 {
        instructions.extend([
            Instruction::Simple(opcodes::ALOAD_1),
            Instruction::Simple(opcodes::ALOAD_2),
            string_equals(),
            Instruction::Simple(opcodes::POP),
        ]);
    }

    let rewritten = fixture.rewrite("run", instructions);
    assert_eq!(rewritten.replaced, 5);
    assert_eq!(rewritten.max_stack, 4 + 1);

    let mut overflowing = context("run");
    overflowing.max_stack = u16::MAX;
    let result = fixture.rewriter().rewrite(&overflowing, Vec::new());
    assert!(matches!(result, Err(Error::StackOverflow(u16::MAX))));
}

#[test]
fn rewriting_twice_registers_once() {
    let fixture = Fixture::new(InstrumentationConfig::default());

    let mut instructions = line(12, 0).to_vec();
    instructions.extend([
        Instruction::Simple(opcodes::ALOAD_1),
        Instruction::Simple(opcodes::ALOAD_2),
        string_equals(),
        Instruction::Simple(opcodes::IRETURN),
    ]);

    let first = fixture.rewrite("run", instructions.clone());
    let second = fixture.rewrite("run", instructions);

    assert_eq!(first, second);
    assert_eq!(fixture.store.len(), 2);
}

#[test]
fn first_registered_candidate_wins() {
    let registry = ReplacementRegistry::builder()
        .provider(
            ReplacementProvider::new("java/util/Collection", "test/First")
                .instance(
                    "contains",
                    "contains",
                    "(Ljava/util/Collection;Ljava/lang/Object;Ljava/lang/String;)Z",
                    ReplacementCategory::Boolean,
                )
                .unwrap(),
        )
        .provider(
            ReplacementProvider::new("java/util/ArrayList", "test/Second")
                .instance(
                    "contains",
                    "contains",
                    "(Ljava/util/ArrayList;Ljava/lang/Object;Ljava/lang/String;)Z",
                    ReplacementCategory::Tracker,
                )
                .unwrap(),
        )
        .build();
    let fixture = Fixture::with_registry(registry);

    let mut instructions = line(1, 0).to_vec();
    instructions.extend([
        Instruction::Simple(opcodes::ALOAD_1),
        Instruction::Simple(opcodes::ALOAD_2),
        call(
            InvokeKind::Virtual,
            "java/util/ArrayList",
            "contains",
            "(Ljava/lang/Object;)Z",
        ),
        Instruction::Simple(opcodes::IRETURN),
    ]);

    let rewritten = fixture.rewrite("run", instructions);
    let Instruction::Method(replacement) = &rewritten.instructions[5] else {
        panic!("expected the replacement call");
    };
    assert_eq!(replacement.owner, "test/First");
    assert!(fixture
        .store
        .contains("MethodReplacement_at_com.example.Service_00001_0_BOOLEAN_true"));
}

#[test]
fn unresolvable_owner_is_fatal() {
    let fixture = Fixture {
        resolver: ClassHierarchy::new().declare("java/lang/Object", None, &[]),
        ..Fixture::new(InstrumentationConfig::default())
    };

    let mut instructions = line(1, 0).to_vec();
    instructions.extend([
        call(InvokeKind::Static, "java/lang/invoke/Missing", "run", "()V"),
        Instruction::Simple(opcodes::RETURN),
    ]);

    let result = fixture.rewriter().rewrite(&context("run"), instructions);
    assert!(matches!(
        result,
        Err(Error::ClassNotFound { owner }) if owner == "java/lang/invoke/Missing"
    ));
}

#[test]
fn calls_without_replacements_pass_through() {
    let fixture = Fixture::new(InstrumentationConfig::default());

    let mut instructions = line(12, 0).to_vec();
    instructions.extend([
        Instruction::Simple(opcodes::ALOAD_1),
        call(
            InvokeKind::Interface,
            "java/util/Iterator",
            "hasNext",
            "()Z",
        ),
        Instruction::Simple(opcodes::POP),
        Instruction::Simple(opcodes::ALOAD_2),
        Instruction::LoadString("done".to_string()),
        call(
            InvokeKind::Virtual,
            "java/io/PrintStream",
            "println",
            "(Ljava/lang/String;)V",
        ),
        Instruction::Simple(opcodes::RETURN),
    ]);

    let rewritten = fixture.rewrite("loop", instructions.clone());
    assert_eq!(rewritten.replaced, 0);
    assert_eq!(rewritten.instructions, instructions);
    assert!(fixture.store.is_empty());
}

#[test]
fn instance_and_static_intent_are_distinguished() {
    let call = MethodDescriptor::parse("(II)Ljava/lang/String;").unwrap();

    let instance = ReplacementCandidate::new(
        "test/R",
        "format",
        "format",
        false,
        "(Ljava/lang/Object;IILjava/lang/String;)Ljava/lang/String;",
        ReplacementCategory::Tracker,
    )
    .unwrap();
    let static_shape = ReplacementCandidate::new(
        "test/R",
        "format",
        "format",
        true,
        "(Ljava/lang/Object;IILjava/lang/String;)Ljava/lang/String;",
        ReplacementCategory::Tracker,
    )
    .unwrap();

    assert!(DescriptorMatcher::matches(&call, &instance, false));
    assert!(!DescriptorMatcher::matches(&call, &static_shape, false));
    assert!(!DescriptorMatcher::matches(&call, &instance, true));

    let other_return = MethodDescriptor::parse("(II)I").unwrap();
    assert!(!DescriptorMatcher::matches(&other_return, &instance, false));
}

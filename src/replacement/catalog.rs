//! The built-in catalog of replacement providers.
//!
//! Each table lists the functions a runtime replacement class declares for one standard-library
//! type. Descriptors are the replacement's own: instance replacements take the receiver first,
//! and every replacement takes the correlation id last.

use crate::{
    replacement::{ReplacementCategory, ReplacementProvider},
    Result,
};

use ReplacementCategory::{Boolean, Exception, Tracker};

/// Package holding the runtime replacement classes
const RUNTIME_PACKAGE: &str = "classweave/runtime";

/// One catalogued function
struct Function {
    name: &'static str,
    replacing_static: bool,
    descriptor: &'static str,
    category: ReplacementCategory,
}

const fn instance_method(
    name: &'static str,
    descriptor: &'static str,
    category: ReplacementCategory,
) -> Function {
    Function {
        name,
        replacing_static: false,
        descriptor,
        category,
    }
}

const fn static_method(
    name: &'static str,
    descriptor: &'static str,
    category: ReplacementCategory,
) -> Function {
    Function {
        name,
        replacing_static: true,
        descriptor,
        category,
    }
}

#[rustfmt::skip]
const STRING: &[Function] = &[
    instance_method("equals", "(Ljava/lang/String;Ljava/lang/Object;Ljava/lang/String;)Z", Boolean),
    instance_method("equalsIgnoreCase", "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;)Z", Boolean),
    instance_method("startsWith", "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;)Z", Boolean),
    instance_method("startsWith", "(Ljava/lang/String;Ljava/lang/String;ILjava/lang/String;)Z", Boolean),
    instance_method("endsWith", "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;)Z", Boolean),
    instance_method("contains", "(Ljava/lang/String;Ljava/lang/CharSequence;Ljava/lang/String;)Z", Boolean),
    instance_method("contentEquals", "(Ljava/lang/String;Ljava/lang/CharSequence;Ljava/lang/String;)Z", Boolean),
    instance_method("isEmpty", "(Ljava/lang/String;Ljava/lang/String;)Z", Boolean),
    instance_method("matches", "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;)Z", Boolean),
];

#[rustfmt::skip]
const INTEGER: &[Function] = &[
    static_method("parseInt", "(Ljava/lang/String;Ljava/lang/String;)I", Exception),
    static_method("valueOf", "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/Integer;", Exception),
    instance_method("equals", "(Ljava/lang/Integer;Ljava/lang/Object;Ljava/lang/String;)Z", Boolean),
];

#[rustfmt::skip]
const LONG: &[Function] = &[
    static_method("parseLong", "(Ljava/lang/String;Ljava/lang/String;)J", Exception),
    static_method("valueOf", "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/Long;", Exception),
];

#[rustfmt::skip]
const DOUBLE: &[Function] = &[
    static_method("parseDouble", "(Ljava/lang/String;Ljava/lang/String;)D", Exception),
    static_method("valueOf", "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/Double;", Exception),
];

#[rustfmt::skip]
const BOOLEAN: &[Function] = &[
    static_method("parseBoolean", "(Ljava/lang/String;Ljava/lang/String;)Z", Boolean),
];

#[rustfmt::skip]
const OBJECTS: &[Function] = &[
    static_method("equals", "(Ljava/lang/Object;Ljava/lang/Object;Ljava/lang/String;)Z", Boolean),
];

#[rustfmt::skip]
const COLLECTION: &[Function] = &[
    instance_method("contains", "(Ljava/util/Collection;Ljava/lang/Object;Ljava/lang/String;)Z", Boolean),
    instance_method("containsAll", "(Ljava/util/Collection;Ljava/util/Collection;Ljava/lang/String;)Z", Boolean),
    instance_method("remove", "(Ljava/util/Collection;Ljava/lang/Object;Ljava/lang/String;)Z", Boolean),
    instance_method("isEmpty", "(Ljava/util/Collection;Ljava/lang/String;)Z", Boolean),
];

#[rustfmt::skip]
const MAP: &[Function] = &[
    instance_method("containsKey", "(Ljava/util/Map;Ljava/lang/Object;Ljava/lang/String;)Z", Boolean),
    instance_method("containsValue", "(Ljava/util/Map;Ljava/lang/Object;Ljava/lang/String;)Z", Boolean),
    instance_method("isEmpty", "(Ljava/util/Map;Ljava/lang/String;)Z", Boolean),
];

#[rustfmt::skip]
const PATTERN: &[Function] = &[
    static_method("matches", "(Ljava/lang/String;Ljava/lang/CharSequence;Ljava/lang/String;)Z", Boolean),
];

#[rustfmt::skip]
const MATCHER: &[Function] = &[
    instance_method("matches", "(Ljava/util/regex/Matcher;Ljava/lang/String;)Z", Boolean),
    instance_method("find", "(Ljava/util/regex/Matcher;Ljava/lang/String;)Z", Boolean),
];

#[rustfmt::skip]
const LOCAL_DATE: &[Function] = &[
    static_method("parse", "(Ljava/lang/CharSequence;Ljava/lang/String;)Ljava/time/LocalDate;", Exception),
];

#[rustfmt::skip]
const LOCAL_DATE_TIME: &[Function] = &[
    static_method("parse", "(Ljava/lang/CharSequence;Ljava/lang/String;)Ljava/time/LocalDateTime;", Exception),
];

#[rustfmt::skip]
const SYSTEM: &[Function] = &[
    static_method("getProperty", "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;", Tracker),
    static_method("getenv", "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;", Tracker),
];

/// (target type, replacement class simple name, functions) in registration order
const PROVIDERS: &[(&str, &str, &[Function])] = &[
    ("java/lang/String", "StringClassReplacement", STRING),
    ("java/lang/Integer", "IntegerClassReplacement", INTEGER),
    ("java/lang/Long", "LongClassReplacement", LONG),
    ("java/lang/Double", "DoubleClassReplacement", DOUBLE),
    ("java/lang/Boolean", "BooleanClassReplacement", BOOLEAN),
    ("java/util/Objects", "ObjectsClassReplacement", OBJECTS),
    ("java/util/Collection", "CollectionClassReplacement", COLLECTION),
    ("java/util/Map", "MapClassReplacement", MAP),
    ("java/util/regex/Pattern", "PatternClassReplacement", PATTERN),
    ("java/util/regex/Matcher", "MatcherClassReplacement", MATCHER),
    ("java/time/LocalDate", "LocalDateClassReplacement", LOCAL_DATE),
    ("java/time/LocalDateTime", "LocalDateTimeClassReplacement", LOCAL_DATE_TIME),
    ("java/lang/System", "SystemClassReplacement", SYSTEM),
];

/// Builds the standard providers in registration order.
///
/// # Errors
/// Returns an error if a catalogued descriptor does not carry the replacement calling convention.
pub fn standard_providers() -> Result<Vec<ReplacementProvider>> {
    PROVIDERS
        .iter()
        .map(|(target, simple_name, functions)| {
            let declaring_class = format!("{RUNTIME_PACKAGE}/{simple_name}");
            functions.iter().try_fold(
                ReplacementProvider::new(target, &declaring_class),
                |provider, function| {
                    if function.replacing_static {
                        provider.static_method(
                            function.name,
                            function.name,
                            function.descriptor,
                            function.category,
                        )
                    } else {
                        provider.instance(
                            function.name,
                            function.name,
                            function.descriptor,
                            function.category,
                        )
                    }
                },
            )
        })
        .collect()
}

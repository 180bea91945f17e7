use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Every argument type an instruction signature can name.
///
/// Declaration order is significant: `guess_token_type` tries the guessable
/// types top to bottom and returns the first whose validator matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArgType {
    Unit,
    Building,
    Team,
    ItemType,
    LiquidType,
    UnitType,
    BlockType,
    Senseable,
    Number,
    ContentType,
    String,
    Boolean,
    Null,
    JumpAddress,
    OperandTest,
    OperandTriple,
    OperandDouble,
    TargetClass,
    UnitSortCriteria,
    BuildingGroup,
    RuleName,
    SenseShorthand,
    Variable,
    Any,
    Valid,
}

pub enum Validator {
    Literals(&'static [&'static str]),
    Pattern(&'static str),
    Predicate(fn(&str) -> bool),
    Nothing,
}

pub struct TypeDescriptor {
    pub ty: ArgType,
    pub name: &'static str,
    pub validator: Validator,
    pub also_accepts: &'static [ArgType],
    pub exclude: &'static [ArgType],
    pub do_not_guess: bool,
}

const ITEMS: &[&str] = &[
    "@copper", "@lead", "@metaglass", "@graphite", "@sand", "@coal", "@titanium", "@thorium",
    "@scrap", "@silicon", "@plastanium", "@phase-fabric", "@surge-alloy", "@spore-pod",
    "@blast-compound", "@pyratite", "@beryllium", "@tungsten", "@oxide", "@carbide",
    "@fissile-matter", "@dormant-cyst",
];

const LIQUIDS: &[&str] = &[
    "@water", "@slag", "@oil", "@cryofluid", "@neoplasm", "@arkycite", "@gallium", "@ozone",
    "@hydrogen", "@nitrogen", "@cyanogen",
];

const UNITS: &[&str] = &[
    "@dagger", "@mace", "@fortress", "@scepter", "@reign", "@nova", "@pulsar", "@quasar",
    "@vela", "@corvus", "@crawler", "@atrax", "@spiroct", "@arkyid", "@toxopid", "@flare",
    "@horizon", "@zenith", "@antumbra", "@eclipse", "@mono", "@poly", "@mega", "@quad", "@oct",
    "@risso", "@minke", "@bryde", "@sei", "@omura", "@retusa", "@oxynoe", "@cyerce",
    "@aegires", "@navanax", "@alpha", "@beta", "@gamma", "@stell", "@locus", "@precept",
    "@vanquish", "@conquer", "@merui", "@cleroi", "@anthicus", "@tecta", "@collaris", "@elude",
    "@avert", "@obviate", "@quell", "@disrupt", "@evoke", "@incite", "@emanate",
];

/// Blocks whose internal name has no hyphen; the rest are recognized by shape.
const SINGLE_WORD_BLOCKS: &[&str] = &[
    "@conveyor", "@junction", "@router", "@sorter", "@distributor", "@overflow-gate",
    "@duo", "@scatter", "@scorch", "@hail", "@wave", "@lancer", "@arc", "@parallax",
    "@swarmer", "@salvo", "@segment", "@tsunami", "@fuse", "@ripple", "@cyclone",
    "@foreshadow", "@spectre", "@meltdown", "@container", "@vault", "@unloader", "@message",
    "@switch", "@memory-cell", "@air", "@stone", "@grass", "@sand-floor", "@water-floor",
    "@thruster", "@battery", "@diode", "@node", "@illuminator",
];

const SENSEABLES: &[&str] = &[
    "@totalItems", "@firstItem", "@totalLiquids", "@totalPower", "@itemCapacity",
    "@liquidCapacity", "@powerCapacity", "@powerNetStored", "@powerNetCapacity",
    "@powerNetIn", "@powerNetOut", "@ammo", "@totalAmmo", "@ammoCapacity", "@health",
    "@maxHealth", "@heat", "@shield", "@armor", "@efficiency", "@progress", "@timescale",
    "@rotation", "@x", "@y", "@shootX", "@shootY", "@size", "@dead", "@range", "@shooting",
    "@boosting", "@mineX", "@mineY", "@mining", "@speed", "@team", "@type", "@flag",
    "@controlled", "@controller", "@name", "@payloadCount", "@payloadType", "@enabled",
    "@config", "@color",
];

const NUMERIC_CONSTANTS: &[&str] = &[
    "@counter", "@time", "@tick", "@second", "@minute", "@waveNumber", "@waveTime",
    "@mapw", "@maph", "@links", "@ipt", "@thisx", "@thisy", "@server", "@client",
    "@ctrlProcessor", "@ctrlPlayer", "@ctrlCommand",
];

fn is_number(token: &str) -> bool {
    static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^(-?\d+(\.\d+)?(e-?\d+)?|0x[0-9a-fA-F]+|0b[01]+|%[0-9a-fA-F]{6}([0-9a-fA-F]{2})?)$")
            .unwrap()
    });
    NUMERIC_CONSTANTS.contains(&token) || NUMBER.is_match(token)
}

fn is_block(token: &str) -> bool {
    SINGLE_WORD_BLOCKS.contains(&token)
        || (token.len() > 1
            && token.starts_with('@')
            && token.contains('-')
            && token[1..].chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
}

fn is_jump_target(token: &str) -> bool {
    static TARGET: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(\d+|[A-Za-z_$][\w.$()-]*)$").unwrap());
    TARGET.is_match(token)
}

use ArgType as T;

/// Indexed by `ArgType as usize`.
static DESCRIPTORS: &[TypeDescriptor] = &[
    TypeDescriptor {
        ty: T::Unit,
        name: "unit",
        validator: Validator::Literals(&["@unit"]),
        also_accepts: &[T::Variable],
        exclude: &[],
        do_not_guess: false,
    },
    TypeDescriptor {
        ty: T::Building,
        name: "building",
        validator: Validator::Pattern(
            r"^(@this|(cell|bank|message|switch|display|processor|sorter|container|vault|turret|conveyor|node|battery|reactor|door|unloader|illuminator|duo|lancer|ripple|foreshadow|salvo|core)\d+)$",
        ),
        also_accepts: &[T::Variable],
        exclude: &[],
        do_not_guess: false,
    },
    TypeDescriptor {
        ty: T::Team,
        name: "team",
        validator: Validator::Literals(&[
            "@derelict", "@sharded", "@crux", "@malis", "@green", "@blue",
        ]),
        also_accepts: &[T::Variable, T::Number],
        exclude: &[],
        do_not_guess: false,
    },
    TypeDescriptor {
        ty: T::ItemType,
        name: "itemType",
        validator: Validator::Literals(ITEMS),
        also_accepts: &[T::Variable],
        exclude: &[],
        do_not_guess: false,
    },
    TypeDescriptor {
        ty: T::LiquidType,
        name: "liquidType",
        validator: Validator::Literals(LIQUIDS),
        also_accepts: &[T::Variable],
        exclude: &[],
        do_not_guess: false,
    },
    TypeDescriptor {
        ty: T::UnitType,
        name: "unitType",
        validator: Validator::Literals(UNITS),
        also_accepts: &[T::Variable],
        exclude: &[],
        do_not_guess: false,
    },
    TypeDescriptor {
        ty: T::BlockType,
        name: "blockType",
        validator: Validator::Predicate(is_block),
        also_accepts: &[T::Variable],
        exclude: &[],
        do_not_guess: false,
    },
    TypeDescriptor {
        ty: T::Senseable,
        name: "senseable",
        validator: Validator::Literals(SENSEABLES),
        also_accepts: &[T::Variable, T::ItemType, T::LiquidType],
        exclude: &[],
        do_not_guess: false,
    },
    TypeDescriptor {
        ty: T::Number,
        name: "number",
        validator: Validator::Predicate(is_number),
        also_accepts: &[T::Variable, T::Boolean, T::Null],
        exclude: &[],
        do_not_guess: false,
    },
    TypeDescriptor {
        ty: T::ContentType,
        name: "contentType",
        validator: Validator::Pattern(r"^@[\w-]+$"),
        also_accepts: &[T::Variable, T::ItemType, T::LiquidType, T::UnitType, T::BlockType],
        exclude: &[],
        do_not_guess: false,
    },
    TypeDescriptor {
        ty: T::String,
        name: "string",
        validator: Validator::Pattern(r#"^"[^"]*"$"#),
        also_accepts: &[T::Variable],
        exclude: &[],
        do_not_guess: false,
    },
    TypeDescriptor {
        ty: T::Boolean,
        name: "boolean",
        validator: Validator::Literals(&["true", "false"]),
        also_accepts: &[T::Variable, T::Number],
        exclude: &[],
        do_not_guess: false,
    },
    TypeDescriptor {
        ty: T::Null,
        name: "null",
        validator: Validator::Literals(&["null"]),
        also_accepts: &[],
        exclude: &[],
        do_not_guess: false,
    },
    TypeDescriptor {
        ty: T::JumpAddress,
        name: "jumpAddress",
        validator: Validator::Predicate(is_jump_target),
        also_accepts: &[],
        exclude: &[T::String, T::Boolean, T::Null],
        do_not_guess: true,
    },
    TypeDescriptor {
        ty: T::OperandTest,
        name: "operandTest",
        validator: Validator::Literals(&[
            "equal", "notEqual", "lessThan", "lessThanEq", "greaterThan", "greaterThanEq",
            "strictEqual", "always",
        ]),
        also_accepts: &[],
        exclude: &[],
        do_not_guess: true,
    },
    TypeDescriptor {
        ty: T::OperandTriple,
        name: "operandTriple",
        validator: Validator::Literals(&[
            "add", "sub", "mul", "div", "idiv", "mod", "emod", "pow", "equal", "notEqual",
            "land", "lessThan", "lessThanEq", "greaterThan", "greaterThanEq", "strictEqual",
            "shl", "shr", "ushr", "or", "and", "xor", "max", "min", "angle", "angleDiff", "len",
            "noise",
        ]),
        also_accepts: &[],
        exclude: &[],
        do_not_guess: true,
    },
    TypeDescriptor {
        ty: T::OperandDouble,
        name: "operandDouble",
        validator: Validator::Literals(&[
            "not", "abs", "sign", "log", "logn", "log10", "floor", "ceil", "round", "sqrt",
            "rand", "sin", "cos", "tan", "asin", "acos", "atan",
        ]),
        also_accepts: &[],
        exclude: &[],
        do_not_guess: true,
    },
    TypeDescriptor {
        ty: T::TargetClass,
        name: "targetClass",
        validator: Validator::Literals(&[
            "any", "enemy", "ally", "player", "attacker", "flying", "boss", "ground",
        ]),
        also_accepts: &[],
        exclude: &[],
        do_not_guess: true,
    },
    TypeDescriptor {
        ty: T::UnitSortCriteria,
        name: "unitSortCriteria",
        validator: Validator::Literals(&["distance", "health", "shield", "armor", "maxHealth"]),
        also_accepts: &[],
        exclude: &[],
        do_not_guess: true,
    },
    TypeDescriptor {
        ty: T::BuildingGroup,
        name: "buildingGroup",
        validator: Validator::Literals(&[
            "core", "storage", "generator", "turret", "factory", "repair", "battery", "reactor",
            "drill", "shield",
        ]),
        also_accepts: &[],
        exclude: &[],
        do_not_guess: true,
    },
    TypeDescriptor {
        ty: T::RuleName,
        name: "ruleName",
        validator: Validator::Literals(&[
            "currentWaveTime", "waveTimer", "waves", "wave", "waveSpacing", "waveSending",
            "attackMode", "enemyCoreBuildRadius", "dropZoneRadius", "unitCap", "mapArea",
            "lighting", "ambientLight", "solarMultiplier", "buildSpeed", "unitHealth",
            "unitBuildSpeed", "unitCost", "unitDamage", "blockHealth", "blockDamage",
            "rtsMinWeight", "rtsMinSquad",
        ]),
        also_accepts: &[],
        exclude: &[],
        do_not_guess: true,
    },
    TypeDescriptor {
        ty: T::SenseShorthand,
        name: "senseShorthand",
        validator: Validator::Pattern(r"^@?[A-Za-z_][\w-]*\.@?[A-Za-z][\w-]*$"),
        also_accepts: &[],
        exclude: &[],
        do_not_guess: true,
    },
    TypeDescriptor {
        ty: T::Variable,
        name: "variable",
        validator: Validator::Nothing,
        also_accepts: &[],
        exclude: &[],
        do_not_guess: true,
    },
    TypeDescriptor {
        ty: T::Any,
        name: "any",
        validator: Validator::Nothing,
        also_accepts: &[],
        exclude: &[],
        do_not_guess: true,
    },
    TypeDescriptor {
        ty: T::Valid,
        name: "valid",
        validator: Validator::Nothing,
        also_accepts: &[],
        exclude: &[],
        do_not_guess: true,
    },
];

/// Compiled patterns, one slot per descriptor.
static PATTERNS: LazyLock<Vec<Option<Regex>>> = LazyLock::new(|| {
    DESCRIPTORS
        .iter()
        .map(|descriptor| match descriptor.validator {
            Validator::Pattern(pattern) => Some(Regex::new(pattern).unwrap()),
            _ => None,
        })
        .collect()
});

impl ArgType {
    pub fn descriptor(self) -> &'static TypeDescriptor {
        &DESCRIPTORS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn from_name(name: &str) -> Option<ArgType> {
        DESCRIPTORS
            .iter()
            .find(|descriptor| descriptor.name == name)
            .map(|descriptor| descriptor.ty)
    }

    /// Whether this type's own validator recognizes the raw token.
    pub fn validates(self, token: &str) -> bool {
        match self.descriptor().validator {
            Validator::Literals(literals) => literals.contains(&token),
            Validator::Pattern(_) => PATTERNS[self as usize]
                .as_ref()
                .is_some_and(|pattern| pattern.is_match(token)),
            Validator::Predicate(predicate) => predicate(token),
            Validator::Nothing => false,
        }
    }

    /// Matches anything as a declared argument type.
    pub fn is_wildcard(self) -> bool {
        matches!(self, ArgType::Any | ArgType::Valid)
    }

    /// Carries no information when recorded as a variable's definition type.
    pub fn is_wildcard_definition(self) -> bool {
        matches!(self, ArgType::Any | ArgType::Variable | ArgType::Null | ArgType::Valid)
    }

    /// Whether a value known to be of type `other` may be passed where `self` is expected.
    pub fn accepts(self, other: ArgType) -> bool {
        self == other
            || self.is_wildcard()
            || other.is_wildcard_definition()
            || self.descriptor().also_accepts.contains(&other)
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Best single guess at what a token is. Used for messages and variable detection,
/// never on its own to accept or reject an argument.
pub fn guess_token_type(token: &str) -> ArgType {
    DESCRIPTORS
        .iter()
        .filter(|descriptor| !descriptor.do_not_guess)
        .find(|descriptor| descriptor.ty.validates(token))
        .map(|descriptor| descriptor.ty)
        .unwrap_or(ArgType::Variable)
}

#[cfg(test)]
pub(crate) fn sample_token(ty: ArgType) -> &'static str {
    match ty {
        ArgType::Unit => "@unit",
        ArgType::Building => "cell1",
        ArgType::Team => "@sharded",
        ArgType::ItemType => "@copper",
        ArgType::LiquidType => "@water",
        ArgType::UnitType => "@poly",
        ArgType::BlockType => "@router",
        ArgType::Senseable => "@x",
        ArgType::Number => "1",
        ArgType::ContentType => "@air",
        ArgType::String => "\"text\"",
        ArgType::Boolean => "true",
        ArgType::Null => "null",
        ArgType::JumpAddress => "target",
        ArgType::SenseShorthand => "cell1.@copper",
        ArgType::Variable | ArgType::Any | ArgType::Valid => "value",
        other => match other.descriptor().validator {
            Validator::Literals(literals) => literals[0],
            _ => "value",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn descriptor_table_is_indexed_by_discriminant() {
        for (index, descriptor) in DESCRIPTORS.iter().enumerate() {
            assert_eq!(descriptor.ty as usize, index, "{}", descriptor.name);
        }
    }

    #[test]
    fn every_pattern_compiles() {
        assert_eq!(PATTERNS.len(), DESCRIPTORS.len());
    }

    #[test]
    fn guesses_follow_the_heuristic_order() {
        assert_eq!(guess_token_type("@unit"), ArgType::Unit);
        assert_eq!(guess_token_type("@this"), ArgType::Building);
        assert_eq!(guess_token_type("message1"), ArgType::Building);
        assert_eq!(guess_token_type("@copper"), ArgType::ItemType);
        assert_eq!(guess_token_type("@phase-fabric"), ArgType::ItemType);
        assert_eq!(guess_token_type("@titanium-conveyor"), ArgType::BlockType);
        assert_eq!(guess_token_type("@x"), ArgType::Senseable);
        assert_eq!(guess_token_type("@counter"), ArgType::Number);
        assert_eq!(guess_token_type("-3.5"), ArgType::Number);
        assert_eq!(guess_token_type("%ff00ff"), ArgType::Number);
        assert_eq!(guess_token_type("@solid"), ArgType::ContentType);
        assert_eq!(guess_token_type("\"hi there\""), ArgType::String);
        assert_eq!(guess_token_type("false"), ArgType::Boolean);
        assert_eq!(guess_token_type("null"), ArgType::Null);
        assert_eq!(guess_token_type("add"), ArgType::Variable);
        assert_eq!(guess_token_type("counter"), ArgType::Variable);
    }

    #[test]
    fn round_trips_type_names() {
        for descriptor in DESCRIPTORS {
            assert_eq!(ArgType::from_name(descriptor.name), Some(descriptor.ty));
        }
        assert_eq!(ArgType::from_name("nonsense"), None);
    }

    #[test]
    fn acceptance_honors_wildcards_and_also_accepts() {
        assert!(ArgType::Number.accepts(ArgType::Boolean));
        assert!(ArgType::Number.accepts(ArgType::Variable));
        assert!(ArgType::Any.accepts(ArgType::Unit));
        assert!(ArgType::Senseable.accepts(ArgType::ItemType));
        assert!(!ArgType::Number.accepts(ArgType::String));
        assert!(!ArgType::Building.accepts(ArgType::Unit));
    }
}

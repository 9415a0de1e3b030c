//! The analyzer's type model and its solc-style rendering.

use serde_json::{json, Value};

/// Where a reference-typed value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataLocation {
    Storage,
    StoragePointer,
    Memory,
    Calldata,
}

impl DataLocation {
    /// Location of a declaration given its `storageLocation` keyword.
    pub fn of_declaration(keyword: &str, state_variable: bool) -> Self {
        match keyword {
            "memory" => DataLocation::Memory,
            "calldata" => DataLocation::Calldata,
            "storage" => DataLocation::StoragePointer,
            _ if state_variable => DataLocation::Storage,
            _ => DataLocation::Memory,
        }
    }

    fn type_suffix(self) -> &'static str {
        match self {
            DataLocation::Storage => "storage ref",
            DataLocation::StoragePointer => "storage pointer",
            DataLocation::Memory => "memory",
            DataLocation::Calldata => "calldata",
        }
    }

    fn identifier_suffix(self) -> &'static str {
        match self {
            DataLocation::Storage => "_storage",
            DataLocation::StoragePointer => "_storage_ptr",
            DataLocation::Memory => "_memory_ptr",
            DataLocation::Calldata => "_calldata_ptr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Magic {
    Message,
    Block,
    Transaction,
    Abi,
}

/// Broad kinds used for the return-type compatibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Bool,
    Number,
    String,
    Address,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolType {
    Uint(u16),
    Int(u16),
    Bool,
    Address { payable: bool },
    FixedBytes(u8),
    String(DataLocation),
    Bytes(DataLocation),
    RationalConst(i128),
    StringLiteral(String),
    Contract { name: String, id: i64 },
    Struct { name: String, id: i64, location: DataLocation },
    Enum { name: String, id: i64 },
    Mapping(Box<SolType>, Box<SolType>),
    Array { base: Box<SolType>, length: Option<u64>, location: DataLocation },
    Function { params: Vec<SolType>, returns: Vec<SolType>, mutability: String },
    Modifier(Vec<SolType>),
    Event(Vec<SolType>),
    Error(Vec<SolType>),
    Magic(Magic),
    Tuple(Vec<SolType>),
    TypeType(Box<SolType>),
    Unknown,
}

pub fn uint256() -> SolType {
    SolType::Uint(256)
}

/// The type named by an elementary type keyword (`uint`, `bytes32`, `address payable`...).
pub fn elementary(name: &str, payable: bool, location: DataLocation) -> SolType {
    let bits = |prefix: &str| -> Option<u16> {
        let digits = name.strip_prefix(prefix)?;
        if digits.is_empty() {
            Some(256)
        } else {
            digits.parse().ok()
        }
    };

    match name {
        "bool" => SolType::Bool,
        "address" => SolType::Address { payable },
        "string" => SolType::String(location),
        "bytes" => SolType::Bytes(location),
        "byte" => SolType::FixedBytes(1),
        _ if name.starts_with("uint") => bits("uint").map_or(SolType::Unknown, SolType::Uint),
        _ if name.starts_with("int") => bits("int").map_or(SolType::Unknown, SolType::Int),
        _ if name.starts_with("bytes") => name[5..]
            .parse()
            .map_or(SolType::Unknown, SolType::FixedBytes),
        _ => SolType::Unknown,
    }
}

/// Value of a number literal, scaled by its unit. Anything that is not an integer
/// fitting in `i128` is typed as `uint256`.
pub fn number_literal(value: &str, unit: Option<&str>) -> SolType {
    let digits = value.replace('_', "");
    let parsed = match digits.strip_prefix("0x") {
        Some(hex) => i128::from_str_radix(hex, 16).ok(),
        None => parse_decimal(&digits),
    };
    let multiplier: i128 = match unit {
        Some("gwei") => 1_000_000_000,
        Some("ether") => 1_000_000_000_000_000_000,
        Some("minutes") => 60,
        Some("hours") => 3_600,
        Some("days") => 86_400,
        Some("weeks") => 604_800,
        _ => 1,
    };
    parsed
        .and_then(|v| v.checked_mul(multiplier))
        .map_or_else(uint256, SolType::RationalConst)
}

/// Integer value of `1e18`-style and plain decimal literals.
fn parse_decimal(digits: &str) -> Option<i128> {
    let (mantissa, exponent) = match digits.split_once(['e', 'E']) {
        Some((m, e)) => (m, e.parse::<u32>().ok()?),
        None => (digits, 0),
    };
    if mantissa.contains('.') {
        return None;
    }
    let base: i128 = mantissa.parse().ok()?;
    base.checked_mul(10i128.checked_pow(exponent)?)
}

fn render_list(types: &[SolType]) -> String {
    types
        .iter()
        .map(|t| t.render(true))
        .collect::<Vec<_>>()
        .join(",")
}

fn identifier_list(types: &[SolType]) -> String {
    if types.is_empty() {
        return "$__$".to_string();
    }
    let inner = types
        .iter()
        .map(SolType::identifier)
        .collect::<Vec<_>>()
        .join("_$_");
    format!("$_{inner}_$")
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl SolType {
    pub fn is_unknown(&self) -> bool {
        matches!(self, SolType::Unknown)
    }

    /// The `typeDescriptions` object attached to annotated nodes.
    pub fn descriptions(&self) -> Value {
        if self.is_unknown() {
            return json!({ "typeIdentifier": null, "typeString": null });
        }
        json!({
            "typeIdentifier": self.identifier(),
            "typeString": self.render(true),
        })
    }

    /// Relocates reference types; value types are returned unchanged.
    pub fn located(self, location: DataLocation) -> SolType {
        match self {
            SolType::String(_) => SolType::String(location),
            SolType::Bytes(_) => SolType::Bytes(location),
            SolType::Struct { name, id, .. } => SolType::Struct { name, id, location },
            SolType::Array { base, length, .. } => SolType::Array { base, length, location },
            other => other,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            SolType::Bool => Category::Bool,
            SolType::Uint(_) | SolType::Int(_) | SolType::RationalConst(_) => Category::Number,
            SolType::String(_) | SolType::StringLiteral(_) => Category::String,
            SolType::Address { .. } => Category::Address,
            _ => Category::Other,
        }
    }

    /// Location-free rendering used to compare parameter lists.
    pub fn signature(&self) -> String {
        match self {
            SolType::Unknown => "?".to_string(),
            other => other.render(false),
        }
    }

    /// solc `typeString`.
    pub fn render(&self, with_location: bool) -> String {
        let located = |base: String, location: &DataLocation| {
            if with_location {
                format!("{base} {}", location.type_suffix())
            } else {
                base
            }
        };
        match self {
            SolType::Uint(bits) => format!("uint{bits}"),
            SolType::Int(bits) => format!("int{bits}"),
            SolType::Bool => "bool".to_string(),
            SolType::Address { payable: true } => "address payable".to_string(),
            SolType::Address { payable: false } => "address".to_string(),
            SolType::FixedBytes(size) => format!("bytes{size}"),
            SolType::String(location) => located("string".to_string(), location),
            SolType::Bytes(location) => located("bytes".to_string(), location),
            SolType::RationalConst(value) => format!("int_const {value}"),
            SolType::StringLiteral(value) => format!("literal_string \"{value}\""),
            SolType::Contract { name, .. } => format!("contract {name}"),
            SolType::Struct { name, location, .. } => located(format!("struct {name}"), location),
            SolType::Enum { name, .. } => format!("enum {name}"),
            SolType::Mapping(key, value) => {
                format!("mapping({} => {})", key.render(false), value.render(false))
            }
            SolType::Array { base, length, location } => {
                let dims = length.map_or_else(String::new, |n| n.to_string());
                located(format!("{}[{dims}]", base.render(false)), location)
            }
            SolType::Function { params, returns, mutability } => {
                let mut text = format!("function ({})", render_list(params));
                if mutability != "nonpayable" {
                    text.push(' ');
                    text.push_str(mutability);
                }
                if !returns.is_empty() {
                    text.push_str(&format!(" returns ({})", render_list(returns)));
                }
                text
            }
            SolType::Modifier(params) => format!("modifier ({})", render_list(params)),
            SolType::Event(params) | SolType::Error(params) => {
                format!("function ({})", render_list(params))
            }
            SolType::Magic(Magic::Message) => "msg".to_string(),
            SolType::Magic(Magic::Block) => "block".to_string(),
            SolType::Magic(Magic::Transaction) => "tx".to_string(),
            SolType::Magic(Magic::Abi) => "abi".to_string(),
            SolType::Tuple(items) => format!("tuple({})", render_list(items)),
            SolType::TypeType(inner) => format!("type({})", inner.render(true)),
            SolType::Unknown => "unknown".to_string(),
        }
    }

    /// solc `typeIdentifier`.
    pub fn identifier(&self) -> String {
        match self {
            SolType::Uint(bits) => format!("t_uint{bits}"),
            SolType::Int(bits) => format!("t_int{bits}"),
            SolType::Bool => "t_bool".to_string(),
            SolType::Address { payable: true } => "t_address_payable".to_string(),
            SolType::Address { payable: false } => "t_address".to_string(),
            SolType::FixedBytes(size) => format!("t_bytes{size}"),
            SolType::String(location) => format!("t_string{}", location.identifier_suffix()),
            SolType::Bytes(location) => format!("t_bytes{}", location.identifier_suffix()),
            SolType::RationalConst(value) if *value < 0 => {
                format!("t_rational_minus_{}_by_1", value.unsigned_abs())
            }
            SolType::RationalConst(value) => format!("t_rational_{value}_by_1"),
            SolType::StringLiteral(value) => format!("t_stringliteral_{}", hex(value.as_bytes())),
            SolType::Contract { name, id } => format!("t_contract$_{name}_${id}"),
            SolType::Struct { name, id, location } => {
                format!("t_struct$_{name}_${id}{}", location.identifier_suffix())
            }
            SolType::Enum { name, id } => format!("t_enum$_{name}_${id}"),
            SolType::Mapping(key, value) => {
                format!("t_mapping$_{}_$_{}_$", key.identifier(), value.identifier())
            }
            SolType::Array { base, length, location } => {
                let dims = length.map_or_else(|| "dyn".to_string(), |n| n.to_string());
                format!("t_array$_{}_${dims}{}", base.identifier(), location.identifier_suffix())
            }
            SolType::Function { params, returns, mutability } => format!(
                "t_function_internal_{mutability}{}returns{}",
                identifier_list(params),
                identifier_list(returns)
            ),
            SolType::Modifier(params) => format!("t_modifier{}", identifier_list(params)),
            SolType::Event(params) => format!(
                "t_function_event_nonpayable{}returns$__$",
                identifier_list(params)
            ),
            SolType::Error(params) => {
                format!("t_function_error_pure{}returns$__$", identifier_list(params))
            }
            SolType::Magic(Magic::Message) => "t_magic_message".to_string(),
            SolType::Magic(Magic::Block) => "t_magic_block".to_string(),
            SolType::Magic(Magic::Transaction) => "t_magic_transaction".to_string(),
            SolType::Magic(Magic::Abi) => "t_magic_abi".to_string(),
            SolType::Tuple(items) => format!("t_tuple{}", identifier_list(items)),
            SolType::TypeType(inner) => format!("t_type$_{}_$", inner.identifier()),
            SolType::Unknown => "t_unknown".to_string(),
        }
    }
}

/// Result type of a binary operator. Constant operands are folded.
pub fn binary_result(operator: &str, left: &SolType, right: &SolType) -> SolType {
    match operator {
        "==" | "!=" | "<" | "<=" | ">" | ">=" | "&&" | "||" => return SolType::Bool,
        _ => {}
    }

    if let (SolType::RationalConst(a), SolType::RationalConst(b)) = (left, right) {
        let folded = match operator {
            "+" => a.checked_add(*b),
            "-" => a.checked_sub(*b),
            "*" => a.checked_mul(*b),
            "/" if *b != 0 && a % b == 0 => Some(a / b),
            "%" if *b != 0 => Some(a % b),
            "**" => u32::try_from(*b).ok().and_then(|exp| a.checked_pow(exp)),
            "<<" => u32::try_from(*b).ok().and_then(|shift| a.checked_shl(shift)),
            ">>" => u32::try_from(*b).ok().and_then(|shift| a.checked_shr(shift)),
            "&" => Some(a & b),
            "|" => Some(a | b),
            "^" => Some(a ^ b),
            _ => None,
        };
        return folded.map_or(SolType::Unknown, SolType::RationalConst);
    }

    match operator {
        "<<" | ">>" | "**" => left.clone(),
        _ => match (left, right) {
            (SolType::RationalConst(_), other) | (other, SolType::RationalConst(_)) => {
                other.clone()
            }
            (SolType::Unknown, other) => other.clone(),
            (other, _) => other.clone(),
        },
    }
}

/// Members of the magic globals.
pub fn magic_member(magic: Magic, member: &str) -> SolType {
    match (magic, member) {
        (Magic::Message, "sender") => SolType::Address { payable: false },
        (Magic::Message, "value") => uint256(),
        (Magic::Message, "data") => SolType::Bytes(DataLocation::Calldata),
        (Magic::Message, "sig") => SolType::FixedBytes(4),
        (Magic::Block, "coinbase") => SolType::Address { payable: true },
        (Magic::Block, "timestamp" | "number" | "basefee" | "chainid" | "gaslimit")
        | (Magic::Block, "difficulty" | "prevrandao" | "blobbasefee") => uint256(),
        (Magic::Transaction, "origin") => SolType::Address { payable: false },
        (Magic::Transaction, "gasprice") => uint256(),
        (Magic::Abi, "encode" | "encodePacked" | "encodeWithSelector" | "encodeWithSignature")
        | (Magic::Abi, "encodeCall") => SolType::Function {
            params: vec![],
            returns: vec![SolType::Bytes(DataLocation::Memory)],
            mutability: "pure".to_string(),
        },
        _ => SolType::Unknown,
    }
}

/// Members every value of a builtin type has (`.length`, `.balance`, `.push`...).
pub fn builtin_member(base: &SolType, member: &str) -> SolType {
    match (base, member) {
        (SolType::Address { .. }, "balance") => uint256(),
        (SolType::Address { .. }, "code") => SolType::Bytes(DataLocation::Memory),
        (SolType::Address { .. }, "codehash") => SolType::FixedBytes(32),
        (SolType::Address { payable: true }, "transfer") => SolType::Function {
            params: vec![uint256()],
            returns: vec![],
            mutability: "nonpayable".to_string(),
        },
        (SolType::Address { payable: true }, "send") => SolType::Function {
            params: vec![uint256()],
            returns: vec![SolType::Bool],
            mutability: "nonpayable".to_string(),
        },
        (SolType::Array { .. } | SolType::Bytes(_), "length") => uint256(),
        (SolType::FixedBytes(_), "length") => SolType::Uint(8),
        (SolType::Array { base, .. }, "push") => SolType::Function {
            params: vec![(**base).clone()],
            returns: vec![],
            mutability: "nonpayable".to_string(),
        },
        (SolType::Array { .. }, "pop") => SolType::Function {
            params: vec![],
            returns: vec![],
            mutability: "nonpayable".to_string(),
        },
        _ => SolType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elementary_names_normalise() {
        assert_eq!(elementary("uint", false, DataLocation::Memory), SolType::Uint(256));
        assert_eq!(elementary("int8", false, DataLocation::Memory), SolType::Int(8));
        assert_eq!(elementary("bytes32", false, DataLocation::Memory), SolType::FixedBytes(32));
        assert_eq!(
            elementary("address", true, DataLocation::Memory).render(true),
            "address payable"
        );
    }

    #[test]
    fn reference_types_render_their_location() {
        let state = elementary("string", false, DataLocation::Storage);
        assert_eq!(state.render(true), "string storage ref");
        assert_eq!(state.identifier(), "t_string_storage");
        let local = state.located(DataLocation::Memory);
        assert_eq!(local.identifier(), "t_string_memory_ptr");
    }

    #[test]
    fn function_types_match_solc_shape() {
        let f = SolType::Function {
            params: vec![uint256()],
            returns: vec![SolType::Bool],
            mutability: "view".to_string(),
        };
        assert_eq!(f.render(true), "function (uint256) view returns (bool)");
        assert_eq!(f.identifier(), "t_function_internal_view$_t_uint256_$returns$_t_bool_$");
    }

    #[test]
    fn literals_fold() {
        assert_eq!(number_literal("1_000", None), SolType::RationalConst(1000));
        assert_eq!(number_literal("2", Some("days")), SolType::RationalConst(172_800));
        assert_eq!(number_literal("1e3", None), SolType::RationalConst(1000));
        let sum = binary_result("+", &SolType::RationalConst(2), &SolType::RationalConst(3));
        assert_eq!(sum.identifier(), "t_rational_5_by_1");
        assert_eq!(binary_result("*", &uint256(), &SolType::RationalConst(3)), uint256());
        assert_eq!(binary_result("<", &uint256(), &uint256()), SolType::Bool);
    }

    #[test]
    fn mapping_identifiers_nest() {
        let mapping = SolType::Mapping(
            Box::new(SolType::Address { payable: false }),
            Box::new(uint256()),
        );
        assert_eq!(mapping.render(true), "mapping(address => uint256)");
        assert_eq!(mapping.identifier(), "t_mapping$_t_address_$_t_uint256_$");
    }
}

use crate::args::{is_token_valid_for_type, parse_signature, Arg};
use crate::error::{CommandError, CommandErrorKind};
use crate::expand::{Replace, Transform};
use crate::types::{guess_token_type, ArgType};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Block constructs handled by the preprocessor instead of emitted as code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Namespace,
    ForLoop,
    Conditional,
    End,
}

/// How an overload reports the variables it writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionRule {
    /// Every write-target argument, at its declared type.
    Outputs,
    /// The target is defined at the guessed type of the assigned value.
    AssignedValue { target: usize, value: usize },
    /// The output is defined at the type of the sensed property, when known.
    SensedProperty { output: usize, property: usize },
}

/// One overload of an instruction.
#[derive(Debug, Clone)]
pub struct CommandDefinition {
    pub name: String,
    pub args: Vec<Arg>,
    pub replace: Replace,
    pub defines: DefinitionRule,
    pub is_world_only: bool,
    /// The mnemonic itself is the first argument; used by block constructs.
    pub check_first_token_as_arg: bool,
    pub block: Option<BlockKind>,
    pub description: &'static str,
}

impl CommandDefinition {
    /// Builds an overload from `"mnemonic arg arg ..."`.
    fn new(signature: &str, description: &'static str) -> Self {
        let (name, rest) = signature.split_once(' ').unwrap_or((signature, ""));
        Self {
            name: name.to_string(),
            args: parse_signature(rest)
                .unwrap_or_else(|e| panic!("invalid builtin signature \"{}\": {}", signature, e)),
            replace: Replace::Keep,
            defines: DefinitionRule::Outputs,
            is_world_only: false,
            check_first_token_as_arg: false,
            block: None,
            description,
        }
    }

    fn block(signature: &str, kind: BlockKind, description: &'static str) -> Self {
        let name = signature.split(' ').next().unwrap_or(signature);
        Self {
            name: name.to_string(),
            args: parse_signature(signature)
                .unwrap_or_else(|e| panic!("invalid builtin signature \"{}\": {}", signature, e)),
            check_first_token_as_arg: true,
            block: Some(kind),
            ..Self::new(name, description)
        }
    }

    fn template(mut self, patterns: &'static [&'static str]) -> Self {
        self.replace = Replace::Template(patterns);
        self
    }

    fn transform(mut self, transform: Transform) -> Self {
        self.replace = Replace::Transform(transform);
        self
    }

    fn defines(mut self, rule: DefinitionRule) -> Self {
        self.defines = rule;
        self
    }

    fn world_only(mut self) -> Self {
        self.is_world_only = true;
        self
    }

    /// Token-count bounds; `None` means unbounded.
    pub fn arity(&self) -> (usize, Option<usize>) {
        let min = self.args.iter().filter(|arg| !arg.is_optional).count();
        let max = if self.args.iter().any(|arg| arg.spread) {
            None
        } else {
            Some(self.args.len())
        };
        (min, max)
    }

    /// The tokens this overload treats as arguments.
    pub fn argument_tokens<'t>(&self, tokens: &'t [String]) -> &'t [String] {
        if self.check_first_token_as_arg {
            tokens
        } else {
            tokens.get(1..).unwrap_or(&[])
        }
    }

    /// The argument a given argument-token position binds to.
    pub fn arg_at(&self, position: usize) -> Option<&Arg> {
        self.args.get(position).or_else(|| self.args.iter().find(|arg| arg.spread))
    }

    /// Pairs each argument token with the argument it binds to.
    pub fn bind<'s, 't>(&'s self, tokens: &'t [String]) -> impl Iterator<Item = (&'t String, &'s Arg)> {
        self.argument_tokens(tokens)
            .iter()
            .enumerate()
            .filter_map(move |(position, token)| self.arg_at(position).map(|arg| (token, arg)))
    }

    pub fn signature(&self) -> String {
        let args = self.args.iter().map(|arg| arg.to_string()).collect::<Vec<_>>().join(" ");
        if args.is_empty() {
            self.name.clone()
        } else if self.check_first_token_as_arg {
            args
        } else {
            format!("{} {}", self.name, args)
        }
    }

    /// Validates a full token line (mnemonic included) against this overload.
    pub fn check(&self, tokens: &[String]) -> Result<(), CommandError> {
        let args = self.argument_tokens(tokens);
        let (min, max) = self.arity();

        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            let expected = match max {
                Some(max) if max == min => format!("{}", min),
                Some(max) => format!("{} to {}", min, max),
                None => format!("at least {}", min),
            };
            return Err(CommandError::argument_count(format!(
                "Incorrect number of arguments for \"{}\": expected {}, got {}",
                self.signature(),
                expected,
                args.len()
            ))
            .low_priority(self.check_first_token_as_arg));
        }

        for (token, arg) in self.bind(tokens) {
            if !is_token_valid_for_type(token, arg) {
                let message = match arg.ty() {
                    Some(_) if arg.is_variable => format!(
                        "Type mismatch: \"{}\" must be a variable name to be written as {}, but looks like a {}",
                        token, arg.name, guess_token_type(token)
                    ),
                    Some(ty) => format!(
                        "Type mismatch: value \"{}\" was expected to be of type {}, but was of type {}",
                        token, ty, guess_token_type(token)
                    ),
                    None => format!("Expected \"{}\", got \"{}\"", arg.name, token),
                };
                return Err(CommandError::type_mismatch(message).low_priority(self.check_first_token_as_arg));
            }
        }

        Ok(())
    }

    /// Variables written by this command line, with the type each is written at.
    pub fn variables_defined(&self, tokens: &[String]) -> Vec<(String, ArgType)> {
        let args = self.argument_tokens(tokens);
        match self.defines {
            DefinitionRule::Outputs => self
                .bind(tokens)
                .filter(|(token, arg)| arg.is_variable && token.as_str() != "_")
                .filter_map(|(token, arg)| arg.ty().map(|ty| (token.clone(), ty)))
                .collect(),
            DefinitionRule::AssignedValue { target, value } => match (args.get(target), args.get(value)) {
                (Some(target), Some(value)) if target != "_" => {
                    vec![(target.clone(), guess_token_type(value))]
                }
                _ => Vec::new(),
            },
            DefinitionRule::SensedProperty { output, property } => {
                match (args.get(output), args.get(property)) {
                    (Some(output), Some(property)) if output != "_" => {
                        let property = property.rsplit('.').next().unwrap_or(property);
                        let ty = sensed_property_type(&crate::expand::sensed_property(property));
                        vec![(output.clone(), ty)]
                    }
                    _ => Vec::new(),
                }
            }
        }
    }

    /// Every variable read by this command line, keyed by name, with the type it is read as.
    pub fn variables_used(&self, tokens: &[String]) -> Vec<(String, ArgType)> {
        self.bind(tokens)
            .filter(|(_, arg)| !arg.is_variable)
            .filter_map(|(token, arg)| match arg.ty() {
                Some(ArgType::JumpAddress) | None => None,
                Some(ty)
                    if token.as_str() != "_"
                        && !ty.validates(token)
                        && guess_token_type(token) == ArgType::Variable =>
                {
                    Some((token.clone(), ty))
                }
                Some(_) => None,
            })
            .collect()
    }

    /// Jump targets referenced by this command line.
    pub fn jump_labels_used(&self, tokens: &[String]) -> Vec<String> {
        self.bind(tokens)
            .filter(|(_, arg)| arg.ty() == Some(ArgType::JumpAddress))
            .map(|(token, _)| token.clone())
            .collect()
    }
}

fn sensed_property_type(property: &str) -> ArgType {
    match property {
        "@type" | "@payloadType" | "@config" => ArgType::ContentType,
        "@firstItem" => ArgType::ItemType,
        "@controller" => ArgType::Unit,
        "@team" => ArgType::Team,
        "@name" => ArgType::Any,
        "@dead" | "@shooting" | "@boosting" | "@mining" | "@enabled" => ArgType::Boolean,
        _ if property.starts_with('@') => ArgType::Number,
        _ => ArgType::Any,
    }
}

/// Mnemonic → overloads, in declaration order.
#[derive(Debug, Default)]
pub struct CommandTable {
    commands: HashMap<String, Vec<CommandDefinition>>,
}

static BUILTIN: LazyLock<CommandTable> = LazyLock::new(|| {
    let mut table = CommandTable::default();
    for command in builtin_commands() {
        table.insert(command);
    }
    table
});

impl CommandTable {
    /// The instruction set of the language, built on first use and shared read-only.
    pub fn builtin() -> &'static CommandTable {
        &BUILTIN
    }

    pub fn insert(&mut self, command: CommandDefinition) {
        self.commands.entry(command.name.clone()).or_default().push(command);
    }

    pub fn overloads(&self, mnemonic: &str) -> &[CommandDefinition] {
        self.commands.get(mnemonic).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandDefinition> {
        self.commands.values().flatten()
    }

    pub fn is_block_keyword(&self, mnemonic: &str) -> bool {
        self.overloads(mnemonic).iter().any(|command| command.block.is_some())
    }

    /// Picks the first overload, in declaration order, that accepts the whole line.
    pub fn resolve(&self, tokens: &[String]) -> Result<&CommandDefinition, CommandError> {
        let Some(mnemonic) = tokens.first() else {
            return Err(CommandError::bad_structure("Empty line has no command"));
        };
        let overloads = self.overloads(mnemonic);
        if overloads.is_empty() {
            return Err(CommandError::no_command(format!("Unknown command \"{}\"", mnemonic)));
        }

        let mut errors = Vec::new();
        for command in overloads {
            match command.check(tokens) {
                Ok(()) => return Ok(command),
                Err(error) => errors.push(error),
            }
        }

        Err(pick_error(mnemonic, overloads, errors))
    }

    /// Every overload that accepts the line; the type checker unions over all of them.
    pub fn matching(&self, tokens: &[String]) -> Vec<&CommandDefinition> {
        tokens
            .first()
            .map(|mnemonic| {
                self.overloads(mnemonic)
                    .iter()
                    .filter(|command| command.block.is_none() && command.check(tokens).is_ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Chooses the most useful error among failed overloads: a unique type error,
/// then a unique argument-count error, else a summary of all overloads.
/// Errors from block-construct overloads only count when nothing else failed.
fn pick_error(mnemonic: &str, overloads: &[CommandDefinition], errors: Vec<CommandError>) -> CommandError {
    let preferred: Vec<&CommandError> = if errors.iter().any(|error| !error.low_priority) {
        errors.iter().filter(|error| !error.low_priority).collect()
    } else {
        errors.iter().collect()
    };

    if let [only] = preferred.as_slice() {
        return (*only).clone();
    }

    for kind in [CommandErrorKind::Type, CommandErrorKind::ArgumentCount] {
        let of_kind: Vec<&&CommandError> = preferred.iter().filter(|error| error.kind == kind).collect();
        if let [only] = of_kind.as_slice() {
            return (**only).clone();
        }
    }

    let signatures = overloads
        .iter()
        .map(|command| format!("\n    {}  ({})", command.signature(), command.description))
        .collect::<String>();
    CommandError::type_mismatch(format!(
        "Line did not match any overloads for command \"{}\". Possible overloads:{}",
        mnemonic, signatures
    ))
}

fn builtin_commands() -> Vec<CommandDefinition> {
    use CommandDefinition as C;
    use DefinitionRule::{AssignedValue, SensedProperty};

    vec![
        C::new("read output:*any cell:building index:number", "Reads a number from a memory cell."),
        C::new("write value:any cell:building index:number", "Writes a value to a memory cell."),
        C::new("draw clear r:number g:number b:number", "Clears the display buffer."),
        C::new("draw color r:number g:number b:number a:number?", "Sets the draw color."),
        C::new("draw col color:number", "Sets the draw color from a packed color."),
        C::new("draw stroke width:number", "Sets the line width."),
        C::new("draw line x1:number y1:number x2:number y2:number", "Draws a line."),
        C::new("draw rect x:number y:number width:number height:number", "Draws a filled rectangle."),
        C::new("draw lineRect x:number y:number width:number height:number", "Draws a rectangle outline."),
        C::new("draw poly x:number y:number sides:number radius:number rotation:number", "Draws a filled polygon."),
        C::new("draw linePoly x:number y:number sides:number radius:number rotation:number", "Draws a polygon outline."),
        C::new("draw triangle x1:number y1:number x2:number y2:number x3:number y3:number", "Draws a filled triangle."),
        C::new("draw image x:number y:number image:contentType size:number rotation:number?", "Draws a content icon."),
        C::new("print message:any", "Appends a value to the text buffer."),
        C::new("print ...messages:any", "Appends each value to the text buffer.")
            .transform(Transform::PrintEach),
        C::new("drawflush display:building", "Flushes the draw buffer to a display."),
        C::new("printflush messageblock:building", "Flushes the text buffer to a message block."),
        C::new("getlink output:*building index:number", "Gets a linked building by index."),
        C::new("control enabled building:building enabled:boolean", "Enables or disables a building."),
        C::new("control shoot building:building x:number y:number shoot:boolean", "Aims a turret at a position."),
        C::new("control shootp building:building unit:unit shoot:boolean", "Aims a turret at a unit."),
        C::new("control config building:building value:any", "Configures a building."),
        C::new("control color building:building color:number", "Sets an illuminator's color."),
        C::new(
            "radar target1:targetClass target2:targetClass target3:targetClass sort:unitSortCriteria turret:building order:number output:*unit",
            "Finds units near a building.",
        ),
        C::new("sensor output:*any building:building property:senseable", "Reads a property of a building.")
            .defines(SensedProperty { output: 0, property: 2 }),
        C::new("sensor output:*any unit:unit property:senseable", "Reads a property of a unit.")
            .defines(SensedProperty { output: 0, property: 2 }),
        C::new("sensor output:*any target:senseShorthand", "Reads target.property.")
            .transform(Transform::SensorShorthand)
            .defines(SensedProperty { output: 0, property: 1 }),
        C::new("set variable:*any value:any", "Sets a variable.")
            .defines(AssignedValue { target: 0, value: 1 }),
        C::new("set @counter value:number", "Jumps to an instruction address."),
        C::new("op operation:operandTriple output:*number a:number b:number", "Performs a binary operation."),
        C::new("op operation:operandDouble output:*number a:number", "Performs a unary operation."),
        C::new("op operation:operandTriple variable:*number value:number", "Applies a binary operation in place.")
            .template(&["op %1 %2 %2 %3"]),
        C::new("op operation:operandDouble variable:*number", "Applies a unary operation in place.")
            .template(&["op %1 %2 %2"]),
        C::new("lookup block output:*blockType index:number", "Looks up a block by index."),
        C::new("lookup unit output:*unitType index:number", "Looks up a unit type by index."),
        C::new("lookup item output:*itemType index:number", "Looks up an item by index."),
        C::new("lookup liquid output:*liquidType index:number", "Looks up a liquid by index."),
        C::new("packcolor output:*number r:number g:number b:number a:number", "Packs a color into a number."),
        C::new("wait seconds:number", "Waits for a number of seconds."),
        C::new("stop", "Halts the processor."),
        C::new("end", "Jumps back to the first instruction."),
        C::new("jump target:jumpAddress condition:operandTest a:any b:any", "Jumps if the condition holds."),
        C::new("jump target:jumpAddress always", "Jumps unconditionally.")
            .template(&["jump %1 always 0 0"]),
        C::new("ubind type:unitType", "Binds the next unit of a type."),
        C::new("ucontrol idle", "Makes the bound unit idle."),
        C::new("ucontrol stop", "Stops the bound unit."),
        C::new("ucontrol move x:number y:number", "Moves the bound unit."),
        C::new("ucontrol approach x:number y:number radius:number", "Moves the bound unit near a position."),
        C::new("ucontrol pathfind x:number y:number", "Pathfinds the bound unit to a position."),
        C::new("ucontrol autoPathfind", "Pathfinds the bound unit to the enemy spawn."),
        C::new("ucontrol boost enable:boolean", "Starts or stops boosting."),
        C::new("ucontrol target x:number y:number shoot:boolean", "Shoots at a position."),
        C::new("ucontrol targetp unit:unit shoot:boolean", "Shoots at a unit."),
        C::new("ucontrol itemDrop building:building amount:number", "Drops items into a building."),
        C::new("ucontrol itemTake building:building item:itemType amount:number", "Takes items from a building."),
        C::new("ucontrol payDrop", "Drops the carried payload."),
        C::new("ucontrol payTake takeUnits:boolean", "Picks up a payload."),
        C::new("ucontrol payEnter", "Enters the payload block below."),
        C::new("ucontrol mine x:number y:number", "Mines an ore tile."),
        C::new("ucontrol flag value:number", "Sets the bound unit's flag."),
        C::new("ucontrol build x:number y:number block:blockType rotation:number config:any", "Builds a block."),
        C::new(
            "ucontrol getBlock x:number y:number type:*blockType building:*building floor:*blockType",
            "Reads the block at a position.",
        ),
        C::new("ucontrol within x:number y:number radius:number result:*boolean", "Checks if the bound unit is near a position."),
        C::new("ucontrol unbind", "Returns the bound unit to its normal AI."),
        C::new(
            "uradar target1:targetClass target2:targetClass target3:targetClass sort:unitSortCriteria unused:number order:number output:*unit",
            "Finds units near the bound unit.",
        ),
        C::new(
            "uradar target1:targetClass target2:targetClass target3:targetClass sort:unitSortCriteria order:number output:*unit",
            "Finds units near the bound unit.",
        )
        .template(&["uradar %1 %2 %3 %4 0 %5 %6"]),
        C::new(
            "ulocate ore group:buildingGroup enemy:boolean ore:itemType outX:*number outY:*number found:*boolean building:*building",
            "Locates an ore.",
        ),
        C::new(
            "ulocate building group:buildingGroup enemy:boolean ore:itemType outX:*number outY:*number found:*boolean building:*building",
            "Locates a building.",
        ),
        C::new(
            "ulocate spawn group:buildingGroup enemy:boolean ore:itemType outX:*number outY:*number found:*boolean building:*building",
            "Locates an enemy spawn.",
        ),
        C::new(
            "ulocate damaged group:buildingGroup enemy:boolean ore:itemType outX:*number outY:*number found:*boolean building:*building",
            "Locates a damaged building.",
        ),
        C::new("ulocate ore ore:itemType outX:*number outY:*number found:*boolean", "Locates an ore.")
            .template(&["ulocate ore core true %2 %3 %4 %5 _"]),
        C::new(
            "ulocate building group:buildingGroup enemy:boolean outX:*number outY:*number found:*boolean building:*building",
            "Locates a building.",
        )
        .template(&["ulocate building %2 %3 @copper %4 %5 %6 %7"]),
        C::new("ulocate spawn outX:*number outY:*number found:*boolean building:*building", "Locates an enemy spawn.")
            .template(&["ulocate spawn core true @copper %2 %3 %4 %5"]),
        C::new("ulocate damaged outX:*number outY:*number found:*boolean building:*building", "Locates a damaged building.")
            .template(&["ulocate damaged core true @copper %2 %3 %4 %5"]),
        // World processor only.
        C::new("getblock floor output:*blockType x:number y:number", "Reads the floor at a position.").world_only(),
        C::new("getblock ore output:*blockType x:number y:number", "Reads the ore at a position.").world_only(),
        C::new("getblock block output:*blockType x:number y:number", "Reads the block at a position.").world_only(),
        C::new("getblock building output:*building x:number y:number", "Reads the building at a position.").world_only(),
        C::new("setblock floor block:blockType x:number y:number", "Sets the floor at a position.").world_only(),
        C::new("setblock ore block:blockType x:number y:number", "Sets the ore at a position.").world_only(),
        C::new(
            "setblock block block:blockType x:number y:number team:team rotation:number",
            "Places a block at a position.",
        )
        .world_only(),
        C::new(
            "spawn type:unitType x:number y:number rotation:number team:team output:*unit",
            "Spawns a unit.",
        )
        .world_only(),
        C::new("status false effect:any unit:unit duration:number", "Applies a status effect to a unit.").world_only(),
        C::new("status true effect:any unit:unit", "Clears a status effect from a unit.").world_only(),
        C::new("spawnwave x:number y:number natural:boolean", "Spawns a wave.").world_only(),
        C::new("setrule rule:ruleName value:number", "Sets a game rule.").world_only(),
        C::new("message notify", "Shows the text buffer as a notification.").world_only(),
        C::new("message announce duration:number", "Shows the text buffer as an announcement.").world_only(),
        C::new("message toast duration:number", "Shows the text buffer as a toast.").world_only(),
        C::new("message mission", "Shows the text buffer as the mission.").world_only(),
        C::new("cutscene pan x:number y:number speed:number", "Pans the camera.").world_only(),
        C::new("cutscene zoom level:number", "Zooms the camera.").world_only(),
        C::new("cutscene stop", "Returns camera control to the player.").world_only(),
        C::new(
            "explosion team:team x:number y:number radius:number damage:number air:boolean ground:boolean pierce:boolean",
            "Creates an explosion.",
        )
        .world_only(),
        C::new("setrate ipt:number", "Sets the instructions per tick.").world_only(),
        C::new("getflag output:*boolean flag:string", "Reads a global flag.").world_only(),
        C::new("setflag flag:string value:boolean", "Sets a global flag.").world_only(),
        // Extended instructions.
        C::new("call function:jumpAddress", "Calls a function, storing the return address in _stack1.")
            .template(&["op add _stack1 @counter 1", "jump %1 always 0 0"]),
        C::new("return", "Returns to the address in _stack1.").template(&["set @counter _stack1"]),
        C::new("increment variable:*number amount:number", "Adds to a variable.")
            .template(&["op add %1 %1 %2"]),
        C::new("increment variable:*number", "Adds 1 to a variable.").template(&["op add %1 %1 1"]),
        C::new("decrement variable:*number amount:number", "Subtracts from a variable.")
            .template(&["op sub %1 %1 %2"]),
        C::new("decrement variable:*number", "Subtracts 1 from a variable.").template(&["op sub %1 %1 1"]),
        C::new("uflag flag:number", "Sets the bound unit's flag.").template(&["ucontrol flag %1"]),
        // Block constructs.
        C::block("namespace name:variable", BlockKind::Namespace, "Prefixes every variable inside the block."),
        C::block("namespace", BlockKind::Namespace, "Prefixes every variable inside the block."),
        C::block(
            "&for variable:variable in lower:number upper:number",
            BlockKind::ForLoop,
            "Repeats the block for each integer in an inclusive range.",
        ),
        C::block(
            "&for variable:variable of ...elements:any",
            BlockKind::ForLoop,
            "Repeats the block for each listed value.",
        ),
        C::block("&if condition:any", BlockKind::Conditional, "Includes the block only if the condition holds."),
        C::block("}", BlockKind::End, "Closes the innermost block."),
    ]
}

//! Compiled contract artifacts.
//!
//! Every protocol binary loads the artifact of the round contract at startup and checks
//! the functions it relies on are part of its ABI before talking to the ledger.

use std::{
    error::Error,
    fmt, fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// Where the binaries look for the artifact by default.
pub const DEFAULT_ARTIFACT_PATH: &str = "build/contracts/BCFL.json";

/// The functions the clients call, by their ABI names.
pub const REQUIRED_FUNCTIONS: &[&str] = &[
    "initialize",
    "task",
    "currentRound",
    "getGlobalModelCID",
    "submitGlobalModel",
    "selectTrainersForRound",
    "getSelectedTrainers",
    "submitUpdate",
    "rounds",
    "submitScore",
    "scores",
    "roundState",
    "closeScoring",
    "finalizeRound",
    "distributeTokens",
    "balanceOf",
];

/// Failures loading or checking an artifact.
#[derive(Debug)]
pub enum ArtifactErr {
    Missing(PathBuf),
    Io(io::Error),
    Malformed(serde_json::Error),
    MissingFunction(&'static str),
}

impl fmt::Display for ArtifactErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactErr::Missing(path) => write!(
                f,
                "contract artifact not found at {}, compile and deploy the contract first",
                path.display()
            ),
            ArtifactErr::Io(e) => write!(f, "io error reading the contract artifact: {e}"),
            ArtifactErr::Malformed(e) => write!(f, "malformed contract artifact: {e}"),
            ArtifactErr::MissingFunction(name) => {
                write!(f, "contract ABI lacks the {name} function")
            }
        }
    }
}

impl Error for ArtifactErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ArtifactErr::Io(e) => Some(e),
            ArtifactErr::Malformed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArtifactErr> for io::Error {
    fn from(value: ArtifactErr) -> Self {
        match value {
            ArtifactErr::Io(e) => e,
            e @ ArtifactErr::Missing(_) => io::Error::new(io::ErrorKind::NotFound, e),
            e => io::Error::new(io::ErrorKind::InvalidData, e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
}

/// The subset of a compiled contract the clients care about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractArtifact {
    #[serde(rename = "contractName")]
    pub contract_name: String,
    pub abi: Vec<AbiEntry>,
}

impl ContractArtifact {
    /// Reads the artifact at `path` and checks it exposes every required function.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactErr> {
        let path = path.as_ref();

        let raw = fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ArtifactErr::Missing(path.to_path_buf()),
            _ => ArtifactErr::Io(e),
        })?;

        let artifact: Self = serde_json::from_slice(&raw).map_err(ArtifactErr::Malformed)?;
        artifact.verify()?;
        Ok(artifact)
    }

    pub fn verify(&self) -> Result<(), ArtifactErr> {
        match REQUIRED_FUNCTIONS.iter().find(|f| !self.has_function(f)) {
            Some(missing) => Err(ArtifactErr::MissingFunction(*missing)),
            None => Ok(()),
        }
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.abi
            .iter()
            .any(|entry| entry.kind == "function" && entry.name == name)
    }

    /// The artifact describing the round contract hosted by `Chain`.
    pub fn round_contract() -> Self {
        let param = |name: &str, kind: &str| AbiParam {
            name: name.to_string(),
            kind: kind.to_string(),
        };

        let function = |name: &str, inputs: Vec<AbiParam>, outputs: Vec<AbiParam>| AbiEntry {
            kind: "function".to_string(),
            name: name.to_string(),
            inputs,
            outputs,
        };

        let round = || param("round", "uint256");
        let trainer = || param("trainer", "address");
        let cid = || param("cid", "string");

        let abi = vec![
            function(
                "initialize",
                vec![cid(), param("totalRounds", "uint256"), param("trainerCount", "uint256")],
                vec![],
            ),
            function(
                "task",
                vec![],
                vec![
                    cid(),
                    param("totalRounds", "uint256"),
                    param("trainerCount", "uint256"),
                    param("initialized", "bool"),
                ],
            ),
            function("currentRound", vec![], vec![round()]),
            function("getGlobalModelCID", vec![round()], vec![cid()]),
            function("submitGlobalModel", vec![round(), cid()], vec![]),
            function(
                "selectTrainersForRound",
                vec![round(), param("trainers", "address[]")],
                vec![],
            ),
            function(
                "getSelectedTrainers",
                vec![round()],
                vec![param("trainers", "address[]")],
            ),
            function("submitUpdate", vec![round(), cid()], vec![]),
            function("rounds", vec![round(), trainer()], vec![cid()]),
            function(
                "submitScore",
                vec![round(), trainer(), param("score", "uint256")],
                vec![],
            ),
            function(
                "scores",
                vec![round(), trainer()],
                vec![param("score", "uint256")],
            ),
            function("roundState", vec![round()], vec![param("state", "uint8")]),
            function("closeScoring", vec![round()], vec![]),
            function("finalizeRound", vec![round()], vec![]),
            function(
                "distributeTokens",
                vec![round(), param("totalReward", "uint256")],
                vec![],
            ),
            function(
                "balanceOf",
                vec![param("account", "address")],
                vec![param("balance", "uint256")],
            ),
        ];

        Self {
            contract_name: "BCFL".to_string(),
            abi,
        }
    }

    /// Writes the artifact as pretty JSON, creating the parent directories.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), ArtifactErr> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ArtifactErr::Io)?;
        }

        let raw = serde_json::to_vec_pretty(self).map_err(ArtifactErr::Malformed)?;
        fs::write(path, raw).map_err(ArtifactErr::Io)
    }
}

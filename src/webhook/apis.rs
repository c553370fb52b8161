//! Low-level types

#[derive(serde::Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub message: String,
}

macro_rules! define_const_string {
    ($string:literal, $name: ident) => {
        #[derive(Debug, Copy, Clone, PartialEq, Eq)]
        pub struct $name;

        impl serde::ser::Serialize for $name {
            fn serialize<S: serde::ser::Serializer>(
                &self,
                serializer: S,
            ) -> Result<S::Ok, S::Error> {
                $string.serialize(serializer)
            }
        }

        impl<'de> serde::de::Deserialize<'de> for $name {
            fn deserialize<D: serde::de::Deserializer<'de>>(
                deserializer: D,
            ) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                if s != $string {
                    return Err(<D::Error as serde::de::Error>::custom(format_args!(
                        "expected string '{}', got '{}'",
                        $string, s
                    )));
                }
                Ok(Self)
            }
        }
    };
}

define_const_string!("admission.k8s.io/v1", ApiVersion);
define_const_string!("AdmissionReview", Kind);

#[derive(serde::Deserialize, Debug, Clone)]
pub struct AdmissionReviewRequest {
    #[serde(rename = "apiVersion")]
    pub api_version: ApiVersion,
    pub kind: Kind,
    #[serde(default)]
    pub request: Option<Request>,
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct Request {
    pub uid: String,
    #[serde(default)]
    pub kind: Option<GroupVersionKind>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub object: Option<serde_json::Value>,
}

#[derive(serde::Deserialize, Debug, Clone, Default)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub kind: String,
}

#[derive(serde::Serialize, Debug, Clone)]
pub struct AdmissionReviewResponse {
    #[serde(rename = "apiVersion")]
    pub api_version: ApiVersion,
    pub kind: Kind,
    pub response: Response,
}

#[derive(serde::Serialize, Debug, Clone)]
pub struct Response {
    /// Empty when the request envelope could not be decoded
    pub uid: String,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(flatten)]
    pub patch: Option<Patch>,
}

#[derive(serde::Serialize, Debug, Clone)]
pub struct Patch {
    #[serde(rename = "patchType")]
    pub patch_type: PatchType,
    /// base64-encoded JSON patch
    pub patch: String,
}

#[derive(serde::Serialize, Debug, Clone, Copy)]
pub enum PatchType {
    #[serde(rename = "JSONPatch")]
    JsonPatch,
}

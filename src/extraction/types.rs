use serde::Serialize;
use serde_json::{json, Value};

/// Body posted to the search backend
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub sites: Vec<String>,
    pub prompt: String,
    pub api_key: String,
}

/// Structured-output schema describing one extracted candidate record
pub fn candidate_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "name": { "type": "STRING", "description": "Un nombre descriptivo para la propiedad." },
                "price": { "type": "NUMBER", "description": "El precio del alquiler, como un número." },
                "description": { "type": "STRING", "description": "Un breve resumen de la propiedad." },
                "location": { "type": "STRING", "description": "La ubicación general o ciudad de la propiedad." },
                "contactLink": { "type": "STRING", "description": "Una URL a un perfil de Instagram o un enlace de WhatsApp." },
                "imageUrls": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "Una lista de URLs de las imágenes de la propiedad."
                },
                "comfortFeatures": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "Palabras clave de confort, como \"pileta\", \"parrilla\", \"cancha de pádel\"."
                },
                "proximityToCABA": { "type": "NUMBER", "description": "Tiempo estimado de viaje desde CABA en minutos." },
                "propertyType": { "type": "STRING", "description": "El tipo de propiedad, ej. \"Casa de campo\", \"Quinta\"." },
                "capacity": { "type": "NUMBER", "description": "La capacidad máxima de personas como un número." },
                "sources": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "site": { "type": "STRING", "description": "El nombre del sitio de origen, ej. \"Mercado Libre\"." },
                            "url": { "type": "STRING", "description": "El enlace directo a la publicación." }
                        },
                        "required": ["site", "url"]
                    }
                },
                "availability": { "type": "STRING", "description": "El estado de disponibilidad, ej. \"Disponible en Enero\"." }
            },
            "required": [
                "name", "price", "description", "location", "imageUrls", "proximityToCABA",
                "comfortFeatures", "propertyType", "capacity", "sources", "availability"
            ]
        }
    })
}

use std::path::Path;

use serde_json::json;

/// Two individuals, one organization and four project calls, one of
/// them cancelled.
pub fn write_dataset(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;

    let individuals = json!([
        {
            "id": "ind-1",
            "fullName": "Ana Pop",
            "title": "PhD student",
            "type": "student/early-career",
            "bio": "Researching machine learning for medical imaging.",
            "skills": [{"skill": "Python"}, {"skill": "PyTorch"}],
            "areasOfExpertise": [{"industry": "Healthcare"}],
            "location": "romania",
            "preferences": {"grantFundedProjects": true}
        },
        {
            "id": "ind-2",
            "fullName": "Radu Ionescu",
            "type": "researcher",
            "bio": "Battery chemistry and energy storage systems.",
            "location": "any",
            "preferences": {"collaborations": true}
        }
    ]);
    let organizations = json!([
        {
            "id": 42,
            "name": "MedTech Labs",
            "type": "startup",
            "industry": "Healthcare",
            "description": "We build diagnostic devices for clinics.",
            "location": "other",
            "preferences": {"funding": true}
        }
    ]);
    let project_calls = json!([
        {
            "id": "proj-1",
            "title": "Medical Imaging Grant",
            "type": "funding-opportunity",
            "status": "active",
            "summary": "Funding machine learning research for medical imaging.",
            "applicantTypes": "[\"student\", \"researcher\"]",
            "delivery": "hybrid",
            "duration": "short-term",
            "location": "romania",
            "budget": "10000 EUR",
            "organization": {"name": "Health Agency", "industry": "Healthcare"}
        },
        {
            "id": "proj-2",
            "title": "Energy Storage Partnership",
            "type": "partnership",
            "status": "active",
            "summary": "Industrial partners wanted for battery research.",
            "applicantTypes": ["company", "researcher"],
            "delivery": "in-person",
            "duration": "long-term",
            "location": "germany"
        },
        {
            "id": "proj-3",
            "title": "Diagnostics Accelerator",
            "type": "consulting",
            "summary": "Support for startups building diagnostic devices.",
            "applicantTypes": ["startup"],
            "delivery": "online-virtual",
            "location": "any"
        },
        {
            "id": "proj-4",
            "title": "Cancelled Imaging Call",
            "type": "funding-opportunity",
            "status": "cancelled",
            "summary": "Funding machine learning research for medical imaging.",
            "applicantTypes": ["student"]
        }
    ]);

    for (file, value) in [
        ("individuals.json", individuals),
        ("organizations.json", organizations),
        ("project_calls.json", project_calls),
    ] {
        std::fs::write(dir.join(file), serde_json::to_string_pretty(&value)?)?;
    }
    Ok(())
}

//! One prompt template per analysis slot.
//!
//! Prose slots ask for concise markdown. The CDK slots ask for complete,
//! file-by-file code following the reference organization's conventions.
//! The architecture slot additionally asks for a draw.io XML document, which
//! the renderer splits off from the prose.

use super::PromptInputs;

const SIMILAR_PROJECTS_TEMPLATE: &str = r#"
Research similar projects in the {reference_org} GitHub organization for {project_name}:

{requirements}

Use the GitHub tools to search {reference_org} for repositories that actually exist.

1. **Matching Projects** - repositories whose goals overlap with these requirements
2. **Architecture Patterns** - AWS services and designs those projects use
3. **Reusable Components** - CDK constructs, Lambda handlers, API designs worth reusing
4. **Folder and Deployment Conventions** - how those repositories are laid out and shipped

Only name repositories you have confirmed exist. Do not invent project names.
"#;

const REQUIREMENTS_TEMPLATE: &str = r#"
Analyze requirements for {project_name}:

{requirements}

Provide:
1. **Key Functional Requirements** (bullet points)
2. **Key Non-Functional Requirements** (bullet points)
3. **Main Stakeholders** (list)
4. **Success Criteria** (3-5 points)

Keep it concise and focused.
"#;

const ARCHITECTURE_TEMPLATE: &str = r#"
Design an AWS serverless architecture for {project_name}:

{requirements}

Similar Projects Context: {similar_projects}

Provide:
1. **Architecture Overview** (2-3 sentences)
2. **Key AWS Services** (bullet list, each with a justification)
3. **Data Flow** (brief description)
4. **Security Approach** (3-4 points)
5. **Reference Projects** - only repositories from {reference_org} that use similar patterns
6. **Draw.io XML Diagram** - a complete XML document, starting with <?xml, that can be imported into draw.io

Put the XML diagram last, after all prose.
"#;

const REPOSITORY_STRUCTURE_TEMPLATE: &str = r#"
Analyze repository structure patterns in {reference_org} for {project_name}.

Use the GitHub tools to examine real CDK repositories in {reference_org}. Look for:
- `bin/` entry points and `lib/` stack definitions
- `lambda/` or `src/` function code
- `package.json`, `requirements.txt`, `setup.py`
- `cdk.json`, `tsconfig.json`
- README deployment instructions

Report:
1. **Common Folder Structure**
2. **CDK Stack Patterns**
3. **Lambda Function Organization**
4. **Configuration Standards**
5. **Naming Conventions**
6. **Deployment Patterns**

Base every point on repositories that actually exist.
"#;

const TYPESCRIPT_CDK_TEMPLATE: &str = r#"
Generate a TypeScript CDK project for {project_name}.

Requirements: {requirements}
Similar Projects: {similar_projects}
Repository Structure Analysis: {repository_structure}

Lay the project out as:
```
{project_name}/
├── bin/{project_name}.ts
├── lib/{project_name}-stack.ts
├── lib/constructs/
├── lambda/functions/
├── test/{project_name}.test.ts
├── package.json
├── tsconfig.json
├── cdk.json
└── README.md
```

Write every file in full, following the import style, construct patterns,
dependency versions and naming conventions used in {reference_org}.
"#;

const PYTHON_CDK_TEMPLATE: &str = r#"
Generate a Python CDK project for {project_name}.

Requirements: {requirements}
Similar Projects: {similar_projects}
Repository Structure Analysis: {repository_structure}

Lay the project out as:
```
{project_name}/
├── app.py
├── {project_name}/{project_name}_stack.py
├── {project_name}/constructs/
├── lambda_functions/main_function/handler.py
├── tests/unit/test_{project_name}_stack.py
├── requirements.txt
├── requirements-dev.txt
├── setup.py
├── cdk.json
└── README.md
```

Write every file in full, following the snake_case naming, construct
patterns and dependency versions used in {reference_org}.
"#;

const COST_TEMPLATE: &str = r#"
Estimate AWS costs for {project_name}:

{requirements}

Provide:
1. **Monthly Cost Estimate** (total)
2. **Key Cost Drivers** (top 3 services)
3. **Cost Breakdown** (per service)
4. **Optimization Tips** (3-4 points)

Use current AWS pricing. Keep it practical.
"#;

const DOCUMENTATION_TEMPLATE: &str = r#"
Create technical documentation for {project_name}:

{requirements}

Similar Projects Context: {similar_projects}

Provide:
1. **Project Overview** (2-3 sentences)
2. **Setup Instructions** (step by step)
3. **API Endpoints** (if applicable)
4. **Deployment Steps**
5. **Related Projects** - only repositories that exist in {reference_org}
6. **Lessons Learned**

Keep it practical and concise.
"#;

pub fn similar_projects_prompt(inputs: &PromptInputs) -> String {
    inputs.fill(SIMILAR_PROJECTS_TEMPLATE)
}

pub fn requirements_prompt(inputs: &PromptInputs) -> String {
    inputs.fill(REQUIREMENTS_TEMPLATE)
}

pub fn architecture_prompt(inputs: &PromptInputs) -> String {
    inputs.fill(ARCHITECTURE_TEMPLATE)
}

/// Repository structure analysis only needs the project name.
pub fn repository_structure_prompt(inputs: &PromptInputs) -> String {
    inputs.fill(REPOSITORY_STRUCTURE_TEMPLATE)
}

pub fn typescript_cdk_prompt(inputs: &PromptInputs) -> String {
    inputs.fill(TYPESCRIPT_CDK_TEMPLATE)
}

pub fn python_cdk_prompt(inputs: &PromptInputs) -> String {
    inputs.fill(PYTHON_CDK_TEMPLATE)
}

pub fn cost_prompt(inputs: &PromptInputs) -> String {
    inputs.fill(COST_TEMPLATE)
}

pub fn documentation_prompt(inputs: &PromptInputs) -> String {
    inputs.fill(DOCUMENTATION_TEMPLATE)
}
